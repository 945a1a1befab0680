use crate::classify::{Classifier, Verdict, netloc};
use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::extract::{Extraction, Extractor, parent_directory};
use crate::frontier::Frontier;
use crate::normalize::normalize;
use crate::result::{CrawlRecord, FormDescriptor, FrontierEntry, Method, Status};
use crate::transport::{FetchRequest, Transport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Called once per dispatched entry with the configured max depth.
pub type ProgressCallback = Arc<dyn Fn(&FrontierEntry, usize) + Send + Sync>;

/// Receives everything the engine learns, in dispatch order.
pub trait CrawlObserver {
    fn on_record(&mut self, record: CrawlRecord);

    fn on_forms(&mut self, _forms: &[FormDescriptor]) {}

    /// A candidate that was recognised but deliberately not fetched
    /// (logout endpoints, filtered static assets).
    fn on_excluded(&mut self, _url: &str, _verdict: Verdict) {}
}

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub root_domain: String,
    pub dispatched: usize,
    pub failed: usize,
    /// Entries popped beyond the depth limit and dropped unrecorded.
    pub discarded: usize,
    pub elapsed: Duration,
}

pub struct Crawler {
    transport: Arc<dyn Transport>,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

/// Per-crawl state. The frontier and visited set belong to exactly one crawl.
struct Session<'a> {
    classifier: Classifier,
    extractor: Extractor,
    frontier: Frontier,
    observer: &'a mut dyn CrawlObserver,
}

impl Crawler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: CrawlConfig::default(),
            progress_callback: None,
        }
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn with_include_static(mut self, include_static: bool) -> Self {
        self.config.include_static = include_static;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls breadth-first from `start_url` until the frontier is empty.
    ///
    /// Only setup problems (bad start URL, zero depth) are returned as
    /// errors; anything that goes wrong with a single request is recorded
    /// and the crawl moves on.
    pub async fn crawl(
        &self,
        start_url: &str,
        observer: &mut dyn CrawlObserver,
    ) -> Result<CrawlSummary> {
        let started = Instant::now();
        let root_domain = root_domain_of(start_url)?;
        if self.config.max_depth < 1 {
            return Err(ScanError::ConfigError(
                "maximum depth must be at least 1".to_string(),
            ));
        }

        info!(
            "Starting crawl of {} (root domain {}, max depth {})",
            start_url, root_domain, self.config.max_depth
        );

        let mut session = Session {
            classifier: Classifier::new(root_domain.clone(), self.config.include_static),
            extractor: Extractor::new(root_domain.clone(), self.config.include_static)?,
            frontier: Frontier::new(),
            observer,
        };
        if session.classifier.classify(start_url) == Verdict::Logout {
            warn!("Start URL {} is a session-breaking endpoint, not fetching it", start_url);
            session
                .observer
                .on_excluded(&normalize(start_url), Verdict::Logout);
        } else {
            session.frontier.push(FrontierEntry::get(start_url, 1));
        }

        let mut summary = CrawlSummary {
            root_domain,
            dispatched: 0,
            failed: 0,
            discarded: 0,
            elapsed: Duration::ZERO,
        };

        while let Some(entry) = session.frontier.pop() {
            if entry.depth > self.config.max_depth {
                debug!("Discarding {} at depth {}", entry.url, entry.depth);
                summary.discarded += 1;
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(&entry, self.config.max_depth);
            }

            let record = self.dispatch(&entry, &mut session).await;
            if record.status == Status::Error {
                summary.failed += 1;
            }
            summary.dispatched += 1;
            session.observer.on_record(record);
        }

        summary.elapsed = started.elapsed();
        info!(
            "Crawl complete. Dispatched {} requests ({} failed, {} beyond depth)",
            summary.dispatched, summary.failed, summary.discarded
        );
        Ok(summary)
    }

    /// Fetches one entry, feeds HTML responses through extraction and
    /// scheduling, and returns its record.
    async fn dispatch(&self, entry: &FrontierEntry, session: &mut Session<'_>) -> CrawlRecord {
        let mut record = CrawlRecord::new(entry);
        let request = FetchRequest {
            method: entry.method,
            url: entry.url.clone(),
            body: entry.body.clone(),
        };

        debug!("Fetching {} {}", entry.method, entry.url);
        let response = match self.transport.execute(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Crawl error for {}: {}", entry.url, e);
                return record;
            }
        };

        record.status = Status::Http(response.status);
        record.body_size = response.body.len();

        if !response.is_html() {
            return record;
        }

        let extraction = match session
            .extractor
            .extract(&response.text(), &entry.url, entry.depth + 1)
        {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Failed to extract from {}: {}", entry.url, e);
                return record;
            }
        };

        record.post_params = extraction.post_params();
        session.observer.on_forms(&extraction.forms);
        schedule(&extraction, entry.depth + 1, session);
        record
    }
}

/// Pushes every admissible candidate of `extraction` at `depth`.
fn schedule(extraction: &Extraction, depth: usize, session: &mut Session<'_>) {
    for link in &extraction.links {
        // POST targets are submitted through their form descriptor, which
        // carries the body.
        if link.method != Method::Get || !admit(&link.url, session) {
            continue;
        }
        session
            .frontier
            .push(FrontierEntry::get(link.url.clone(), depth));

        if link.directory_candidate
            && let Some(parent) = parent_directory(&link.url)
            && admit(&parent, session)
            && session.frontier.push(FrontierEntry::get(parent.clone(), depth))
        {
            debug!("Queued parent directory {}", parent);
        }
    }

    for form in &extraction.forms {
        let Some(entry) = form.to_entry() else {
            continue;
        };
        if admit(&form.action_url, session) && admit(&entry.url, session) {
            session.frontier.push(entry);
        }
    }
}

fn admit(url: &str, session: &mut Session<'_>) -> bool {
    match session.classifier.classify(url) {
        Verdict::Accept => true,
        verdict @ (Verdict::Logout | Verdict::StaticAsset) => {
            debug!("Excluding {} ({:?})", url, verdict);
            session.observer.on_excluded(&normalize(url), verdict);
            false
        }
        Verdict::OutOfScope | Verdict::ListingArtifact => false,
    }
}

/// The `host[:port]` every dispatched URL must fall under.
pub fn root_domain_of(start_url: &str) -> Result<String> {
    let parsed = Url::parse(start_url)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScanError::InvalidUrl(format!(
            "{}: only http and https are supported",
            start_url
        )));
    }
    netloc(&parsed).ok_or_else(|| ScanError::InvalidUrl(format!("{}: missing host", start_url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RequestKey;
    use crate::transport::FetchResponse;
    use futures::future::BoxFuture;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, method, path},
    };

    #[derive(Default)]
    struct Collected {
        records: Vec<CrawlRecord>,
        forms: Vec<FormDescriptor>,
        excluded: Vec<(String, Verdict)>,
    }

    impl CrawlObserver for Collected {
        fn on_record(&mut self, record: CrawlRecord) {
            self.records.push(record);
        }

        fn on_forms(&mut self, forms: &[FormDescriptor]) {
            self.forms.extend_from_slice(forms);
        }

        fn on_excluded(&mut self, url: &str, verdict: Verdict) {
            self.excluded.push((url.to_string(), verdict));
        }
    }

    /// In-memory transport keyed by (method, normalized URL). Unknown URLs
    /// answer 404, `fail` URLs answer with a transport error.
    #[derive(Default)]
    struct ScriptedTransport {
        pages: HashMap<(Method, String), String>,
        fail: HashSet<String>,
        sent: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedTransport {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages
                .insert((Method::Get, normalize(url)), html.to_string());
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.fail.insert(normalize(url));
            self
        }

        fn sent(&self) -> Vec<FetchRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute<'a>(
            &'a self,
            request: &'a FetchRequest,
        ) -> BoxFuture<'a, Result<FetchResponse>> {
            Box::pin(async move {
                self.sent.lock().unwrap().push(request.clone());
                let key = normalize(&request.url);
                if self.fail.contains(&key) {
                    return Err(ScanError::Other("connection reset".to_string()));
                }
                Ok(match self.pages.get(&(request.method, key)) {
                    Some(html) => FetchResponse {
                        status: 200,
                        content_type: Some("text/html".to_string()),
                        body: html.as_bytes().to_vec(),
                    },
                    None => FetchResponse {
                        status: 404,
                        content_type: Some("text/html".to_string()),
                        body: Vec::new(),
                    },
                })
            })
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page(
                    "https://example.com/",
                    r#"<html><body>
                        <a href="/about">About</a>
                        <a href="/logout">Log out</a>
                        <form action="/"><input name="q"></form>
                    </body></html>"#,
                )
                .page("https://example.com/about", "<html><body>About us</body></html>"),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        let summary = crawler
            .crawl("https://example.com/", &mut collected)
            .await
            .unwrap();

        let urls: Vec<(&str, usize)> = collected
            .records
            .iter()
            .map(|r| (r.url.as_str(), r.depth))
            .collect();
        assert_eq!(
            urls,
            vec![
                ("https://example.com/", 1),
                ("https://example.com/about", 2),
                ("https://example.com/?q=", 2),
            ]
        );
        assert_eq!(summary.dispatched, 3);
        assert_eq!(
            collected.excluded,
            vec![("https://example.com/logout".to_string(), Verdict::Logout)]
        );
        assert_eq!(collected.forms.len(), 1);
        assert_eq!(collected.forms[0].params, vec!["q".to_string()]);
        assert_eq!(collected.forms[0].depth, 2);
        assert!(transport.sent().iter().all(|r| !r.url.contains("logout")));
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page("https://h/", r#"<a href="/one.html">1</a>"#)
                .page("https://h/one.html", r#"<a href="/two.html">2</a>"#)
                .page("https://h/two.html", r#"<a href="/three.html">3</a>"#),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        let summary = crawler.crawl("https://h/", &mut collected).await.unwrap();

        assert_eq!(collected.records[0].depth, 1);
        assert!(collected.records.iter().all(|r| r.depth <= 2));
        assert_eq!(collected.records.len(), 2);
        assert_eq!(summary.discarded, 1);
        assert!(!transport.sent().iter().any(|r| r.url.ends_with("two.html")));
    }

    #[tokio::test]
    async fn test_no_request_dispatched_twice() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page(
                    "https://h/",
                    r#"<a href="/p.php?b=2&a=1">x</a><a href="/p.php?a=1&b=2#frag">y</a><a href="//h//">root</a>"#,
                )
                .page(
                    "https://h/p.php?a=1&b=2",
                    r#"<a href="/">home</a><a href="/p.php?a=1&amp;b=2">self</a>"#,
                ),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(5);
        let mut collected = Collected::default();

        crawler.crawl("https://h/", &mut collected).await.unwrap();

        let keys: Vec<RequestKey> = collected.records.iter().map(|r| r.key()).collect();
        let unique: HashSet<&RequestKey> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
        assert_eq!(keys.len(), 2);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page("https://h/", r#"<a href="/a.html">a</a><a href="/b.html">b</a>"#)
                .page("https://h/a.html", r#"<a href="/a2.html">a2</a>"#)
                .page("https://h/b.html", r#"<a href="/b2.html">b2</a>"#),
        );
        let crawler = Crawler::new(transport).with_max_depth(3);
        let mut collected = Collected::default();

        crawler.crawl("https://h/", &mut collected).await.unwrap();

        let order: Vec<&str> = collected.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "https://h/",
                "https://h/a.html",
                "https://h/b.html",
                "https://h/a2.html",
                "https://h/b2.html",
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded_and_crawl_continues() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page("https://h/", r#"<a href="/down.php">d</a><a href="/up.php">u</a>"#)
                .page("https://h/up.php", "<p>fine</p>")
                .failing("https://h/down.php"),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        let summary = crawler.crawl("https://h/", &mut collected).await.unwrap();

        let down = collected
            .records
            .iter()
            .find(|r| r.url == "https://h/down.php")
            .unwrap();
        assert_eq!(down.status, Status::Error);
        assert_eq!(down.body_size, 0);
        assert_eq!(summary.failed, 1);
        assert!(collected.records.iter().any(|r| r.url == "https://h/up.php"));
        // no retries
        let attempts = transport
            .sent()
            .iter()
            .filter(|r| r.url.ends_with("down.php"))
            .count();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_scope_containment() {
        let transport = Arc::new(ScriptedTransport::default().page(
            "https://example.com/",
            r#"<a href="https://api.example.com/v1">sub</a>
               <a href="https://evilexample.com/">lookalike</a>
               <a href="https://other.org/">other</a>"#,
        ));
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        crawler
            .crawl("https://example.com/", &mut collected)
            .await
            .unwrap();

        for request in transport.sent() {
            let host = Url::parse(&request.url).unwrap().host_str().unwrap().to_string();
            assert!(host == "example.com" || host.ends_with(".example.com"), "{}", host);
        }
        assert!(collected.records.iter().any(|r| r.url == "https://api.example.com/v1"));
    }

    #[tokio::test]
    async fn test_logout_forms_and_links_never_dispatched() {
        let transport = Arc::new(ScriptedTransport::default().page(
            "https://h/",
            r#"<a href="/account/logout.php">bye</a>
               <a href="/index.php?logout=1">bye</a>
               <form method="post" action="/signout"><input name="t" value="1"></form>"#,
        ));
        let crawler = Crawler::new(transport.clone()).with_max_depth(3);
        let mut collected = Collected::default();

        crawler.crawl("https://h/", &mut collected).await.unwrap();

        assert_eq!(transport.sent().len(), 1);
        let excluded: Vec<&str> = collected.excluded.iter().map(|(u, _)| u.as_str()).collect();
        assert!(excluded.contains(&"https://h/account/logout.php"));
        assert!(excluded.contains(&"https://h/index.php?logout=1"));
        assert!(excluded.contains(&"https://h/signout"));
    }

    #[tokio::test]
    async fn test_logout_start_url_never_dispatched() {
        let transport = Arc::new(
            ScriptedTransport::default().page("https://h/logout.php", r#"<a href="/a">a</a>"#),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        let summary = crawler
            .crawl("https://h/logout.php", &mut collected)
            .await
            .unwrap();

        assert!(transport.sent().is_empty());
        assert!(collected.records.is_empty());
        assert_eq!(summary.dispatched, 0);
        assert_eq!(
            collected.excluded,
            vec![("https://h/logout.php".to_string(), Verdict::Logout)]
        );
    }

    #[tokio::test]
    async fn test_static_assets_skipped_unless_requested() {
        let html = r#"<a href="/report.pdf">pdf</a><script src="/app.js"></script>"#;

        let transport = Arc::new(ScriptedTransport::default().page("https://h/", html));
        let mut collected = Collected::default();
        Crawler::new(transport.clone())
            .with_max_depth(2)
            .crawl("https://h/", &mut collected)
            .await
            .unwrap();
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(collected.excluded.len(), 2);
        assert!(collected.excluded.iter().all(|(_, v)| *v == Verdict::StaticAsset));

        let transport = Arc::new(ScriptedTransport::default().page("https://h/", html));
        let mut collected = Collected::default();
        Crawler::new(transport.clone())
            .with_max_depth(2)
            .with_include_static(true)
            .crawl("https://h/", &mut collected)
            .await
            .unwrap();
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_listing_artifacts_not_followed() {
        let transport = Arc::new(ScriptedTransport::default().page(
            "https://h/files/",
            r#"<a href="?C=N;O=D">Name</a><a href="?C=M;O=A">Modified</a><a href="a.txt">a</a>"#,
        ));
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        crawler.crawl("https://h/files/", &mut collected).await.unwrap();

        let sent: Vec<String> = transport.sent().into_iter().map(|r| r.url).collect();
        assert_eq!(sent, vec!["https://h/files/", "https://h/files/a.txt"]);
    }

    #[tokio::test]
    async fn test_directory_candidate_queues_parent() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .page("https://h/", r#"<a href="/docs/guide/intro">intro</a>"#),
        );
        let crawler = Crawler::new(transport.clone()).with_max_depth(2);
        let mut collected = Collected::default();

        crawler.crawl("https://h/", &mut collected).await.unwrap();

        let sent: Vec<String> = transport.sent().into_iter().map(|r| r.url).collect();
        assert_eq!(
            sent,
            vec![
                "https://h/",
                "https://h/docs/guide/intro",
                "https://h/docs/guide/"
            ]
        );
        assert!(collected.records.iter().all(|r| r.depth <= 2));
    }

    #[tokio::test]
    async fn test_invalid_start_url_is_fatal() {
        let crawler = Crawler::new(Arc::new(ScriptedTransport::default()));
        let mut collected = Collected::default();

        let err = crawler.crawl("not a url", &mut collected).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));

        let err = crawler
            .crawl("ftp://example.com/", &mut collected)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));

        let err = Crawler::new(Arc::new(ScriptedTransport::default()))
            .with_max_depth(0)
            .crawl("https://example.com/", &mut collected)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ConfigError(_)));
        assert!(collected.records.is_empty());
    }

    #[test]
    fn test_root_domain_of() {
        assert_eq!(root_domain_of("https://Example.com/a").unwrap(), "example.com");
        assert_eq!(root_domain_of("http://127.0.0.1:8080/").unwrap(), "127.0.0.1:8080");
        assert_eq!(root_domain_of("https://example.com:443/").unwrap(), "example.com");
    }

    /// Link discovery and form submission against a live HTTP server.
    #[tokio::test]
    async fn test_link_discovery_and_post_form() {
        use crate::transport::HttpTransport;

        let mock_server = MockServer::start().await;

        let root_html = format!(
            r#"<html><body>
                <a href="{}/page1">Page 1</a>
                <a href="/page2">Page 2</a>
                <form method="post" action="/login.php">
                    <input name="user" value="admin">
                    <input name="pass">
                </form>
            </body></html>"#,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(root_html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        for page in ["/page1", "/page2"] {
            Mock::given(method("GET"))
                .and(path(page))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_bytes(b"<html><body>P</body></html>"),
                )
                .mount(&mock_server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path("/login.php"))
            .and(body_string("user=admin&pass="))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"welcome"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let start = Url::parse(&mock_server.uri()).unwrap();
        let transport =
            Arc::new(HttpTransport::new(&CrawlConfig::default(), &start, &[]).unwrap());
        let crawler = Crawler::new(transport).with_max_depth(2);
        let mut collected = Collected::default();

        let summary = crawler.crawl(&mock_server.uri(), &mut collected).await.unwrap();

        assert_eq!(summary.dispatched, 4);
        let root = &collected.records[0];
        assert_eq!(root.status, Status::Http(200));
        assert_eq!(root.body_size, root_html.len());
        assert_eq!(root.post_params, vec!["user=admin", "pass"]);

        let post = collected
            .records
            .iter()
            .find(|r| r.method == Method::Post)
            .unwrap();
        assert!(post.url.ends_with("/login.php"));
        assert_eq!(post.depth, 2);
    }
}
