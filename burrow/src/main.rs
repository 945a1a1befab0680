use burrow::commands::command_argument_builder;
use burrow::handlers::handle_crawl;
use burrow_core::print_banner;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();

    init_tracing(matches.get_flag("verbose"));

    // Show banner unless --silent flag is set
    if !matches.get_flag("silent") {
        print_banner();
    }

    if let Err(e) = handle_crawl(&matches).await {
        eprintln!("{} {:#}", "✗ Crawl failed:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; `--verbose` wins over `RUST_LOG`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
