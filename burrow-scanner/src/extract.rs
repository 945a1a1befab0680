//! Link and form extraction from fetched documents.

use crate::classify::{in_scope, netloc, path_extension};
use crate::error::{Result, ScanError};
use crate::result::{FormDescriptor, Method};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Tag/attribute pairs that carry a followable reference.
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("link", "href"),
    ("script", "src"),
    ("iframe", "src"),
    ("frame", "src"),
];

/// Tag/attribute pairs that only ever point at media. Skipped entirely when
/// static assets are not crawled.
const MEDIA_SOURCES: &[(&str, &str)] = &[
    ("img", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("source", "src"),
    ("track", "src"),
    ("embed", "src"),
    ("object", "data"),
];

const IGNORED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "#"];

/// A candidate request found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub url: String,
    pub method: Method,
    /// The last path segment has no extension or the path ends in `/`.
    pub directory_candidate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub links: Vec<Link>,
    pub forms: Vec<FormDescriptor>,
}

impl Extraction {
    /// Params of the POST forms in this document, in document order.
    pub fn post_params(&self) -> Vec<String> {
        self.forms
            .iter()
            .filter(|f| f.method == Method::Post)
            .flat_map(|f| f.params.iter().cloned())
            .collect()
    }
}

struct Compiled {
    selector: Selector,
    attr: &'static str,
}

pub struct Extractor {
    root_domain: String,
    sources: Vec<Compiled>,
    base: Selector,
    form: Selector,
    controls: Selector,
    option: Selector,
}

impl Extractor {
    pub fn new(root_domain: impl Into<String>, include_static: bool) -> Result<Self> {
        let media: &[(&str, &'static str)] = if include_static { MEDIA_SOURCES } else { &[] };

        let mut sources = Vec::new();
        for &(tag, attr) in LINK_SOURCES.iter().chain(media) {
            sources.push(Compiled {
                selector: selector(&format!("{}[{}]", tag, attr))?,
                attr,
            });
        }

        Ok(Self {
            root_domain: root_domain.into(),
            sources,
            base: selector("base[href]")?,
            form: selector("form")?,
            controls: selector("input, textarea, select")?,
            option: selector("option")?,
        })
    }

    /// Extracts candidate links and forms from `html` fetched at `base_url`.
    /// Forms are stamped with `depth`, the level their submissions enter the
    /// frontier at.
    pub fn extract(&self, html: &str, base_url: &str, depth: usize) -> Result<Extraction> {
        let page_url = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let document = Html::parse_document(html);
        if !document.errors.is_empty() {
            debug!(
                "{} markup errors while parsing {}",
                document.errors.len(),
                base_url
            );
        }

        let base = document
            .select(&self.base)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone());

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for source in &self.sources {
            for element in document.select(&source.selector) {
                let Some(raw) = element.value().attr(source.attr) else {
                    continue;
                };
                if let Some(url) = self.resolve(&base, raw) {
                    let link = Link {
                        directory_candidate: is_directory_candidate(&url),
                        url,
                        method: Method::Get,
                    };
                    if seen.insert((link.url.clone(), link.method)) {
                        links.push(link);
                    }
                }
            }
        }

        let mut forms = Vec::new();
        for form in document.select(&self.form) {
            let method = Method::from_form_attr(form.value().attr("method"));
            let action = match form.value().attr("action").map(str::trim) {
                Some(action) if !action.is_empty() => self.resolve(&base, action),
                _ => self.resolve(&page_url, page_url.as_str()),
            };
            let Some(action_url) = action else {
                debug!("Dropping form with out-of-scope action on {}", base_url);
                continue;
            };

            if seen.insert((action_url.clone(), method)) {
                links.push(Link {
                    url: action_url.clone(),
                    method,
                    directory_candidate: false,
                });
            }

            forms.push(FormDescriptor {
                action_url,
                method,
                params: self.form_params(form),
                depth,
            });
        }

        debug!(
            "Extracted {} links and {} forms from {}",
            links.len(),
            forms.len(),
            base_url
        );
        Ok(Extraction { links, forms })
    }

    fn form_params(&self, form: ElementRef<'_>) -> Vec<String> {
        let mut params = Vec::new();
        for control in form.select(&self.controls) {
            let Some(name) = control.value().attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let value = match control.value().name() {
                "textarea" => Some(control.text().collect::<String>().trim().to_string()),
                "select" => self.selected_option(control),
                _ => control.value().attr("value").map(str::to_string),
            };
            match value {
                Some(v) if !v.is_empty() => params.push(format!("{}={}", name, v)),
                _ => params.push(name.to_string()),
            }
        }
        params
    }

    /// Value of the selected option, else the first option, else nothing.
    fn selected_option(&self, select: ElementRef<'_>) -> Option<String> {
        let options: Vec<ElementRef<'_>> = select.select(&self.option).collect();
        let chosen = options
            .iter()
            .find(|o| o.value().attr("selected").is_some())
            .or_else(|| options.first())?;
        Some(match chosen.value().attr("value") {
            Some(v) => v.to_string(),
            None => chosen.text().collect::<String>().trim().to_string(),
        })
    }

    /// Resolves `href` against `base`, drops the fragment, and keeps it only
    /// if it is an in-scope http(s) URL.
    fn resolve(&self, base: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let lower = href.to_ascii_lowercase();
        if IGNORED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return None;
        }

        let mut resolved = base.join(href).ok()?;
        resolved.set_fragment(None);

        if !matches!(resolved.scheme(), "http" | "https") {
            return None;
        }
        let host = netloc(&resolved)?;
        if !in_scope(&host, &self.root_domain) {
            return None;
        }
        Some(resolved.to_string())
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector {}: {:?}", css, e)))
}

/// A non-root path whose last segment has no extension or that ends in `/`.
pub fn is_directory_candidate(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path();
    if path == "/" || path.is_empty() {
        return false;
    }
    path.ends_with('/') || path_extension(url).is_none()
}

/// The directory containing `url`'s last path segment, without query.
/// `None` for the root.
pub fn parent_directory(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let path = parsed.path().to_string();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let cut = trimmed.rfind('/')?;
    let parent = &trimmed[..=cut];
    parsed.set_path(parent);
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}
