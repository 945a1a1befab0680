use crate::error::{CoreError, Result};
use crate::report::{ReportAggregator, ReportMeta, TOP_FOLDERS, is_failure};
use crate::sink::{Artifact, ReportSink};
use burrow_scanner::{CrawlConfig, CrawlSummary, Crawler, FrontierEntry, HttpTransport, Transport};
use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub max_depth: usize,
    /// `key=value` pairs separated by `;`.
    pub cookie: Option<String>,
    pub include_static: bool,
    /// Suppress the per-request progress lines.
    pub silent: bool,
    pub timeout_secs: u64,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: 3,
            cookie: None,
            include_static: false,
            silent: false,
            timeout_secs: 10,
        }
    }
}

impl CrawlOptions {
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            max_depth: self.max_depth,
            include_static: self.include_static,
            timeout_secs: self.timeout_secs,
            ..CrawlConfig::default()
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Everything a finished crawl produced.
pub struct CrawlOutput {
    pub report: ReportAggregator,
    pub summary: CrawlSummary,
    pub meta: ReportMeta,
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Splits a `key=value; key2=value2` cookie string. Items without `=` are
/// ignored; values may themselves contain `=`.
pub fn parse_cookie_string(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Checks the start URL and depth before anything touches the network.
pub fn validate_options(options: &CrawlOptions) -> Result<Url> {
    let url = Url::parse(&options.url)
        .map_err(|e| CoreError::Config(format!("invalid start URL '{}': {}", options.url, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(CoreError::Config(format!(
            "start URL '{}' must be an http(s) URL with a host",
            options.url
        )));
    }
    if options.max_depth < 1 {
        return Err(CoreError::Config("depth must be at least 1".to_string()));
    }
    Ok(url)
}

/// Execute a crawl over HTTP with the given options
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutput> {
    let start = validate_options(&options)?;
    let cookies = options
        .cookie
        .as_deref()
        .map(parse_cookie_string)
        .unwrap_or_default();
    let transport = HttpTransport::new(&options.crawl_config(), &start, &cookies)?;
    execute_crawl_with(options, Arc::new(transport), progress_callback).await
}

/// Execute a crawl through an arbitrary transport
pub async fn execute_crawl_with(
    options: CrawlOptions,
    transport: Arc<dyn Transport>,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutput> {
    validate_options(&options)?;

    // Single spinner for the whole crawl (only when not silent)
    let progress_bar = if options.silent {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| CoreError::Config(format!("progress template: {}", e)))?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    };

    let processed_count = Arc::new(AtomicUsize::new(0));

    let pb_clone = progress_bar.clone();
    let count_clone = processed_count.clone();
    let user_callback = progress_callback.clone();
    let internal_progress_callback: burrow_scanner::ProgressCallback =
        Arc::new(move |entry: &FrontierEntry, max_depth: usize| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            let line = format!("Crawling ({}/{}): {}", entry.depth, max_depth, entry.url);
            if let Some(ref pb) = pb_clone {
                pb.println(&line);
                pb.set_message(format!("Crawling... {} requests dispatched", count));
            }
            if let Some(ref callback) = user_callback {
                callback(line);
            }
        });

    let crawler = Crawler::new(transport)
        .with_config(options.crawl_config())
        .with_progress_callback(internal_progress_callback);

    let started_at = Local::now();
    let mut report = ReportAggregator::new();
    let result = crawler.crawl(&options.url, &mut report).await;

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} requests dispatched", total));
    }

    let summary = result?;
    debug!("Crawl of {} finished in {:?}", options.url, summary.elapsed);

    let meta = ReportMeta {
        start_url: options.url.clone(),
        started_at,
        elapsed: summary.elapsed,
    };
    Ok(CrawlOutput {
        report,
        summary,
        meta,
    })
}

/// Renders the artifacts into `sink`. The JSON artifact is only produced
/// when asked for.
pub fn write_artifacts(output: &CrawlOutput, sink: &mut dyn ReportSink, json: bool) -> Result<()> {
    sink.write(Artifact::RawList, &output.report.render_raw_list())?;
    sink.write(Artifact::Info, &output.report.render_info(&output.meta))?;
    if json {
        sink.write(Artifact::Json, &output.report.render_json(&output.meta)?)?;
    }
    Ok(())
}

/// Generate the console summary printed after a crawl
pub fn generate_crawl_report(output: &CrawlOutput) -> String {
    let report_data = &output.report;
    let records = report_data.records();
    let failed = records.iter().filter(|r| is_failure(r)).count();

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("{}\n", "# Summary:".bold()));
    report.push_str(&format!("  Target: {}\n", output.meta.start_url));
    report.push_str(&format!(
        "  Elapsed: {:.2}s\n",
        output.meta.elapsed.as_secs_f64()
    ));
    report.push_str(&format!("  Requests dispatched: {}\n", records.len()));
    if failed > 0 {
        report.push_str(&format!("  Failed: {}\n", failed.to_string().red()));
    }
    report.push_str(&format!(
        "  GET parameters: {}\n",
        report_data.get_index().len()
    ));
    report.push_str(&format!(
        "  POST parameters: {}\n",
        report_data.post_index().len()
    ));
    report.push_str(&format!(
        "  Forms found: {}\n",
        report_data.unique_forms().len()
    ));
    if !report_data.logout_urls().is_empty() {
        report.push_str(&format!(
            "  Session-breaking URLs skipped: {}\n",
            report_data.logout_urls().len().to_string().yellow()
        ));
    }

    report.push_str(&format!("\n{}\n", "# Top folders:".bold()));
    for (folder, count) in report_data.top_folders(TOP_FOLDERS) {
        report.push_str(&format!("  {:>5}  {}\n", count, folder));
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}
