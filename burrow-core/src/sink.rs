// Output sinks for the crawl artifacts

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Artifact {
    /// One crawled URL per line.
    RawList,
    /// Header, histograms, indices and per-request lines.
    Info,
    /// Machine-readable copy of the info artifact.
    Json,
}

pub trait ReportSink {
    fn write(&mut self, artifact: Artifact, content: &str) -> io::Result<()>;
}

/// Writes artifacts next to each other as `{stem}.txt`, `{stem}_info.txt`
/// and `{stem}_info.json`.
#[derive(Debug, Clone)]
pub struct FileSink {
    raw_path: PathBuf,
    info_path: PathBuf,
    json_path: Option<PathBuf>,
}

impl FileSink {
    /// Creates (or truncates) every target file up front so an unwritable
    /// destination is reported before the crawl starts.
    pub fn create(dir: &Path, stem: &str, json: bool) -> io::Result<Self> {
        let sink = Self {
            raw_path: dir.join(format!("{}.txt", stem)),
            info_path: dir.join(format!("{}_info.txt", stem)),
            json_path: json.then(|| dir.join(format!("{}_info.json", stem))),
        };
        for path in sink.paths() {
            File::create(path)?;
        }
        Ok(sink)
    }

    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.raw_path.as_path(), self.info_path.as_path()];
        if let Some(ref json) = self.json_path {
            paths.push(json.as_path());
        }
        paths
    }

    pub fn path(&self, artifact: Artifact) -> Option<&Path> {
        match artifact {
            Artifact::RawList => Some(&self.raw_path),
            Artifact::Info => Some(&self.info_path),
            Artifact::Json => self.json_path.as_deref(),
        }
    }
}

impl ReportSink for FileSink {
    fn write(&mut self, artifact: Artifact, content: &str) -> io::Result<()> {
        let Some(path) = self.path(artifact) else {
            return Ok(());
        };
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub artifacts: BTreeMap<Artifact, String>,
}

impl MemorySink {
    pub fn get(&self, artifact: Artifact) -> Option<&str> {
        self.artifacts.get(&artifact).map(String::as_str)
    }
}

impl ReportSink for MemorySink {
    fn write(&mut self, artifact: Artifact, content: &str) -> io::Result<()> {
        self.artifacts.insert(artifact, content.to_string());
        Ok(())
    }
}

/// `{YYYYmmdd_HHMMSS}-{netloc}`, with `:` in the netloc replaced so the
/// name is valid on every filesystem.
pub fn artifact_stem(netloc: &str, at: DateTime<Local>) -> String {
    format!("{}-{}", at.format("%Y%m%d_%H%M%S"), netloc.replace(':', "_"))
}
