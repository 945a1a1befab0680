use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// HTTP method of a crawl unit. Only the two methods a hypertext form can
/// submit are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl Method {
    /// Maps a form `method` attribute onto GET/POST. Anything that is not
    /// `post` (case-insensitive) falls back to GET, including a missing value.
    pub fn from_form_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "post" => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedup identity of a crawl unit: normalized URL plus method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub url: String,
    pub method: Method,
}

impl RequestKey {
    pub fn new(url: &str, method: Method) -> Self {
        Self {
            url: normalize(url),
            method,
        }
    }
}

/// A pending request. Never mutated once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
    pub method: Method,
    pub body: Option<Vec<(String, String)>>,
}

impl FrontierEntry {
    pub fn get(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, depth: usize, body: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            depth,
            method: Method::Post,
            body: Some(body),
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.url, self.method)
    }
}

/// One `<form>` as seen at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub action_url: String,
    pub method: Method,
    /// `name` or `name=value` tokens in document order.
    pub params: Vec<String>,
    pub depth: usize,
}

impl FormDescriptor {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.split_once('=').map(|(name, _)| name).unwrap_or(p))
    }

    /// Name/value pairs as they would be submitted. A bare `name` token
    /// submits an empty value.
    pub fn fields(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|p| match p.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (p.clone(), String::new()),
            })
            .collect()
    }

    /// The URL a GET submission of this form lands on: the action with its
    /// query replaced by the form fields.
    pub fn submission_url(&self) -> Option<String> {
        let mut url = Url::parse(&self.action_url).ok()?;
        url.set_fragment(None);
        url.set_query(None);
        let fields = self.fields();
        if !fields.is_empty() {
            url.query_pairs_mut().extend_pairs(fields.iter());
        }
        Some(url.to_string())
    }

    /// The frontier entry that submits this form, one level below the page
    /// it was found on.
    pub fn to_entry(&self) -> Option<FrontierEntry> {
        match self.method {
            Method::Get => self
                .submission_url()
                .map(|url| FrontierEntry::get(url, self.depth)),
            Method::Post => Some(FrontierEntry::post(
                self.action_url.clone(),
                self.depth,
                self.fields(),
            )),
        }
    }
}

/// Outcome of a dispatched request, numeric or the transport error sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Http(u16),
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Http(code) => write!(f, "{}", code),
            Status::Error => f.write_str("ERR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub method: Method,
    pub depth: usize,
    pub status: Status,
    pub body_size: usize,
    pub get_params: Vec<String>,
    pub post_params: Vec<String>,
}

impl CrawlRecord {
    pub fn new(entry: &FrontierEntry) -> Self {
        Self {
            url: normalize(&entry.url),
            method: entry.method,
            depth: entry.depth,
            status: Status::Error,
            body_size: 0,
            get_params: query_param_names(&entry.url),
            post_params: Vec::new(),
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            url: self.url.clone(),
            method: self.method,
        }
    }
}

/// Distinct query parameter names in first-seen order.
pub fn query_param_names(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for (name, _) in parsed.query_pairs() {
        if !names.iter().any(|n| n == name.as_ref()) {
            names.push(name.into_owned());
        }
    }
    names
}
