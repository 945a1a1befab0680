use anyhow::{Context, Result};
use burrow_core::crawl::{
    CrawlOptions, execute_crawl, generate_crawl_report, validate_options, write_artifacts,
};
use burrow_core::sink::{Artifact, FileSink, artifact_stem};
use burrow_scanner::classify::netloc;
use chrono::Local;
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Where the artifacts go and in which formats.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub dir: PathBuf,
    pub json: bool,
}

/// Build crawl options from parsed command line arguments
pub fn crawl_options_from_args(args: &ArgMatches) -> Result<CrawlOptions> {
    let url = args
        .get_one::<Url>("website")
        .context("--website is required")?;
    let max_depth = args.get_one::<u64>("depth").copied().unwrap_or(3);
    let timeout_secs = args.get_one::<u64>("timeout").copied().unwrap_or(10);

    Ok(CrawlOptions {
        url: url.as_str().to_string(),
        max_depth: usize::try_from(max_depth).context("--depth is too large")?,
        cookie: args.get_one::<String>("cookie").cloned(),
        include_static: args.get_flag("static"),
        silent: args.get_flag("silent"),
        timeout_secs,
    })
}

/// Resolve the output directory from arguments, defaulting to the current one
pub fn output_options_from_args(args: &ArgMatches) -> Result<OutputOptions> {
    Ok(OutputOptions {
        dir: resolve_output_dir(args.get_one::<String>("output").map(String::as_str))?,
        json: args.get_flag("json"),
    })
}

/// Expand `~` and create the directory if it does not exist yet
pub fn resolve_output_dir(output: Option<&str>) -> Result<PathBuf> {
    let dir = match output {
        Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
        None => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

/// Open the sink for a crawl of `start_url` started now
pub fn open_sink(start_url: &Url, output: &OutputOptions) -> Result<FileSink> {
    let host = netloc(start_url).context("start URL has no host")?;
    let stem = artifact_stem(&host, Local::now());
    FileSink::create(&output.dir, &stem, output.json)
        .with_context(|| format!("Cannot write reports to {}", output.dir.display()))
}

/// Run a crawl end to end and return the sink holding the artifacts
pub async fn run_crawl(options: CrawlOptions, output: &OutputOptions) -> Result<FileSink> {
    let start = validate_options(&options)?;
    // An unwritable destination must fail before any request is sent.
    let mut sink = open_sink(&start, output)?;
    let silent = options.silent;

    if !silent {
        println!(
            "{} Crawling {} (depth {})\n",
            "→".blue(),
            options.url.bright_white(),
            options.max_depth
        );
    }

    let crawl_output = execute_crawl(options, None).await?;
    write_artifacts(&crawl_output, &mut sink, output.json)?;
    debug!("Artifacts written to {:?}", sink.paths());

    if !silent {
        println!();
        print!("{}", crawl_output.report.render_info(&crawl_output.meta));
        println!();
        print!("{}", generate_crawl_report(&crawl_output));
    }

    Ok(sink)
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let options = crawl_options_from_args(args)?;
    let output = output_options_from_args(args)?;

    let sink = run_crawl(options, &output).await?;
    print_output_location(&sink);
    Ok(())
}

fn print_output_location(sink: &FileSink) {
    let written: Vec<String> = [Artifact::RawList, Artifact::Info, Artifact::Json]
        .into_iter()
        .filter_map(|artifact| sink.path(artifact))
        .map(|path| path.display().to_string())
        .collect();
    println!(
        "{} Output written to {}",
        "✓".green().bold(),
        written.join(", ")
    );
}
