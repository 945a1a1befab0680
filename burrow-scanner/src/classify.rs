//! Scope and safety predicates applied to every extracted candidate before it
//! may enter the frontier.

use url::Url;
use url::form_urlencoded;

/// Substrings that mark a session-terminating endpoint anywhere in the URL.
///
/// This matches anywhere, not only as a path segment, so something like
/// `/blog/logout-procedures` is excluded as well.
pub const LOGOUT_MARKERS: &[&str] = &[
    "logout",
    "log-out",
    "logoff",
    "log-off",
    "signout",
    "sign-out",
    "disconnect",
    "deconnexion",
    "deconnect",
];

/// Path suffixes that terminate a session without carrying a marker word.
pub const LOGOUT_PATH_SUFFIXES: &[&str] = &["exit.php"];

/// Extensions that are never fetched unless static assets are requested.
pub const STATIC_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "ico", "webp", "tif", "tiff",
    // audio / video
    "mp3", "mp4", "m4a", "avi", "mov", "wmv", "flv", "webm", "ogg", "wav", "mkv",
    // fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // archives
    "zip", "rar", "7z", "tar", "gz", "bz2", "tgz", "iso",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "csv",
    // stylesheets and scripts
    "css", "js", "map",
];

/// Why a candidate was (or was not) admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Not http(s), no host, or a host outside the root domain.
    OutOfScope,
    Logout,
    ListingArtifact,
    StaticAsset,
}

/// Classifier settings. `include_static` is the only axis that varies
/// between crawls.
#[derive(Debug, Clone)]
pub struct Classifier {
    root_domain: String,
    include_static: bool,
}

impl Classifier {
    pub fn new(root_domain: impl Into<String>, include_static: bool) -> Self {
        Self {
            root_domain: root_domain.into().to_ascii_lowercase(),
            include_static,
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    pub fn include_static(&self) -> bool {
        self.include_static
    }

    /// Runs every predicate in order: scope, logout, listing artifact, static.
    pub fn classify(&self, url: &str) -> Verdict {
        let Ok(parsed) = Url::parse(url) else {
            return Verdict::OutOfScope;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return Verdict::OutOfScope;
        }
        match netloc(&parsed) {
            Some(host) if in_scope(&host, &self.root_domain) => {}
            _ => return Verdict::OutOfScope,
        }
        if is_logout(url) {
            return Verdict::Logout;
        }
        if is_listing_artifact(url) {
            return Verdict::ListingArtifact;
        }
        if !should_fetch_static(url, self.include_static) {
            return Verdict::StaticAsset;
        }
        Verdict::Accept
    }
}

/// `host[:port]` of a URL, lowercased. The port is only present when it is
/// not the scheme default.
pub fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host.to_ascii_lowercase(), port),
        None => host.to_ascii_lowercase(),
    })
}

/// True iff `netloc` is `root_domain` or a dot-separated subdomain of it.
pub fn in_scope(netloc: &str, root_domain: &str) -> bool {
    let netloc = netloc.to_ascii_lowercase();
    let root = root_domain.to_ascii_lowercase();
    if root.is_empty() {
        return false;
    }
    netloc == root || netloc.ends_with(&format!(".{}", root))
}

/// True if fetching `url` would likely end the authenticated session.
pub fn is_logout(url: &str) -> bool {
    let lower = url.to_lowercase();
    if LOGOUT_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }

    let (path, query) = match Url::parse(&lower) {
        Ok(parsed) => (parsed.path().to_string(), parsed.query().unwrap_or("").to_string()),
        Err(_) => {
            let without_fragment = lower.split('#').next().unwrap_or("");
            match without_fragment.split_once('?') {
                Some((p, q)) => (p.to_string(), q.to_string()),
                None => (without_fragment.to_string(), String::new()),
            }
        }
    };

    if LOGOUT_PATH_SUFFIXES.iter().any(|s| path.ends_with(s)) {
        return true;
    }
    path.ends_with("login.php") && query.split('&').any(|p| p == "logout=1")
}

/// True if the query is a directory-listing sort toggle (`C=N;O=D` and
/// friends), i.e. a view permutation of the same index page.
pub fn is_listing_artifact(url: &str) -> bool {
    let Some(query) = raw_query(url) else {
        return false;
    };

    let decoded: Vec<String> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| {
            if v.is_empty() {
                k.into_owned()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect();

    let mut column = None;
    let mut order = None;
    for token in decoded.iter().flat_map(|t| t.split(';')) {
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once('=') else {
            return false;
        };
        match key.to_ascii_uppercase().as_str() {
            "C" if column.is_none() => column = Some(value.to_ascii_uppercase()),
            "O" if order.is_none() => order = Some(value.to_ascii_uppercase()),
            _ => return false,
        }
    }

    let column_ok = column
        .as_deref()
        .is_some_and(|c| matches!(c, "N" | "M" | "S" | "D"));
    let order_ok = order.as_deref().is_none_or(|o| matches!(o, "A" | "D"));
    column_ok && order_ok
}

/// False when `url` names a static asset and static assets are excluded.
pub fn should_fetch_static(url: &str, include_static: bool) -> bool {
    include_static || !is_static_asset(url)
}

pub fn is_static_asset(url: &str) -> bool {
    path_extension(url)
        .is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext.as_str()))
}

/// Lowercased extension of the last path segment, ignoring query and
/// fragment.
pub fn path_extension(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_string(),
    };
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn raw_query(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed.query().map(str::to_string),
        Err(_) => url
            .split('#')
            .next()
            .and_then(|u| u.split_once('?'))
            .map(|(_, q)| q.to_string()),
    }
}
