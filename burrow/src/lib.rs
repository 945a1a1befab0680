pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    OutputOptions, crawl_options_from_args, output_options_from_args, resolve_output_dir,
    run_crawl,
};

// Re-export crawl functionality from burrow-core
pub use burrow_core::crawl::{
    CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path, generate_crawl_report,
};
