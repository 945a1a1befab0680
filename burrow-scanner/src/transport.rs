//! The seam to the HTTP collaborator. The engine only builds
//! [`FetchRequest`]s and reads [`FetchResponse`]s; connection handling, TLS,
//! redirects and cookies live behind [`Transport`].

use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::result::Method;
use futures::future::BoxFuture;
use reqwest::Client;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Missing content type counts as HTML; servers that omit it are
    /// usually serving pages.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(true)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<FetchResponse>>;
}

/// `reqwest`-backed transport with one cookie jar shared by the whole crawl.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the client and seeds the jar with `cookies` for `start_url`'s
    /// host. The jar is not touched by the engine afterwards.
    pub fn new(config: &CrawlConfig, start_url: &Url, cookies: &[(String, String)]) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        for (name, value) in cookies {
            let cookie = match start_url.domain() {
                Some(domain) => format!("{}={}; Domain={}; Path=/", name, value, domain),
                None => format!("{}={}; Path=/", name, value),
            };
            jar.add_cookie_str(&cookie, start_url);
        }
        debug!("Seeded cookie jar with {} cookies", cookies.len());

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.div_ceil(2)))
            .cookie_provider(jar)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ScanError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<FetchResponse>> {
        Box::pin(async move {
            let builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => {
                    let body: &[(String, String)] = request.body.as_deref().unwrap_or(&[]);
                    self.client.post(&request.url).form(body)
                }
            };

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = response.bytes().await?.to_vec();

            Ok(FetchResponse {
                status,
                content_type,
                body,
            })
        })
    }
}
