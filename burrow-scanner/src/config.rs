/// Engine and transport settings for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Deepest level dispatched. The start URL is level 1.
    pub max_depth: usize,
    /// Fetch static assets (images, media, documents, css/js) too.
    pub include_static: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_redirects: usize,
    pub accept_invalid_certs: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            include_static: false,
            timeout_secs: 10,
            user_agent: format!(
                "Burrow/{} (https://github.com/trapdoorsec/burrow)",
                env!("CARGO_PKG_VERSION")
            ),
            max_redirects: 5,
            accept_invalid_certs: true,
        }
    }
}
