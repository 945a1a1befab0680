// Report aggregation and artifact rendering

use burrow_scanner::classify::{is_listing_artifact, netloc, path_extension};
use burrow_scanner::{CrawlObserver, CrawlRecord, FormDescriptor, Method, Status, Verdict, normalize};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use url::Url;

use crate::crawl::extract_url_path;

pub const TOP_FOLDERS: usize = 5;

pub const SESSION_NOTE: &str = "not crawled to avoid breaking the session";
pub const STATIC_NOTE: &str = "static asset, not fetched";

/// Presentation names for common extensions. Anything else is shown
/// upper-cased.
const EXTENSION_NAMES: &[(&str, &str)] = &[
    ("", "No extension"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("xhtml", "HTML"),
    ("php", "PHP"),
    ("asp", "ASP"),
    ("aspx", "ASP.NET"),
    ("jsp", "JSP"),
    ("do", "Java (Struts)"),
    ("action", "Java (Struts)"),
    ("cgi", "CGI"),
    ("pl", "Perl"),
    ("py", "Python"),
    ("js", "JavaScript"),
    ("css", "CSS"),
    ("json", "JSON"),
    ("xml", "XML"),
    ("txt", "Text"),
    ("pdf", "PDF"),
];

pub fn extension_label(ext: &str) -> String {
    EXTENSION_NAMES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| ext.to_uppercase())
}

/// Parent folder of a URL's path, non-recursive: `/a/b/c.php` -> `/a/b/`.
pub fn folder_of(url: &str) -> String {
    let path = extract_url_path(url);
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}

/// Facts about the run that are not part of the ledger.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub start_url: String,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormKey {
    pub depth: usize,
    pub action_url: String,
    pub params: Vec<String>,
}

/// Accumulates crawl outcomes as they arrive. One instance per crawl.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    records: Vec<CrawlRecord>,
    forms: Vec<(FormKey, Method)>,
    form_keys: HashSet<FormKey>,
    logout_urls: BTreeSet<String>,
    static_urls: BTreeSet<String>,
    extensions: BTreeMap<String, usize>,
    folders: HashMap<String, usize>,
    get_index: BTreeMap<String, BTreeSet<String>>,
    post_index: BTreeMap<String, BTreeSet<String>>,
}

impl CrawlObserver for ReportAggregator {
    fn on_record(&mut self, record: CrawlRecord) {
        let ext = path_extension(&record.url).unwrap_or_default();
        *self.extensions.entry(extension_label(&ext)).or_insert(0) += 1;
        *self.folders.entry(folder_of(&record.url)).or_insert(0) += 1;

        for name in &record.get_params {
            self.get_index
                .entry(name.clone())
                .or_default()
                .insert(record.url.clone());
        }
        self.records.push(record);
    }

    fn on_forms(&mut self, forms: &[FormDescriptor]) {
        for form in forms {
            let action = normalize(&form.action_url);
            if form.method == Method::Post {
                for name in form.param_names() {
                    self.post_index
                        .entry(name.to_string())
                        .or_default()
                        .insert(action.clone());
                }
            }

            let key = FormKey {
                depth: form.depth,
                action_url: action,
                params: form.params.clone(),
            };
            if self.form_keys.insert(key.clone()) {
                self.forms.push((key, form.method));
            }
        }
    }

    fn on_excluded(&mut self, url: &str, verdict: Verdict) {
        match verdict {
            Verdict::Logout => {
                self.logout_urls.insert(url.to_string());
            }
            Verdict::StaticAsset => {
                self.static_urls.insert(url.to_string());
            }
            _ => {}
        }
    }
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in dispatch order.
    pub fn records(&self) -> &[CrawlRecord] {
        &self.records
    }

    /// Records ordered by URL, then method.
    pub fn sorted_records(&self) -> Vec<&CrawlRecord> {
        let mut sorted: Vec<&CrawlRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| (&a.url, a.method).cmp(&(&b.url, b.method)));
        sorted
    }

    pub fn logout_urls(&self) -> &BTreeSet<String> {
        &self.logout_urls
    }

    pub fn static_urls(&self) -> &BTreeSet<String> {
        &self.static_urls
    }

    pub fn get_index(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.get_index
    }

    pub fn post_index(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.post_index
    }

    /// Extension label -> count, most frequent first.
    pub fn extension_histogram(&self) -> Vec<(String, usize)> {
        let mut histogram: Vec<(String, usize)> = self
            .extensions
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        histogram
    }

    /// The `n` folders with the most dispatched requests.
    pub fn top_folders(&self, n: usize) -> Vec<(String, usize)> {
        let mut folders: Vec<(String, usize)> =
            self.folders.iter().map(|(k, v)| (k.clone(), *v)).collect();
        folders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        folders.truncate(n);
        folders
    }

    /// Forms deduplicated on (action, params, depth), shallowest first.
    pub fn unique_forms(&self) -> Vec<(&FormKey, Method)> {
        let mut forms: Vec<(&FormKey, Method)> =
            self.forms.iter().map(|(k, m)| (k, *m)).collect();
        forms.sort_by(|a, b| a.0.cmp(b.0));
        forms
    }

    pub fn count_by_method(&self, method: Method) -> usize {
        self.records.iter().filter(|r| r.method == method).count()
    }

    /// The raw URL list: crawled GET URLs, sorted by (base path, full URL),
    /// one per line. Listing-sort variants collapse onto their directory's
    /// normalized form, so a directory is listed once.
    pub fn render_raw_list(&self) -> String {
        let mut lines: BTreeSet<(String, String)> = BTreeSet::new();
        for record in self.records.iter().filter(|r| r.method == Method::Get) {
            let url = if is_listing_artifact(&record.url) {
                normalize(&listing_directory(&record.url))
            } else {
                record.url.clone()
            };
            let base = url.split('?').next().unwrap_or(&url).to_string();
            lines.insert((base, url));
        }

        let mut seen = HashSet::new();
        let mut out = String::new();
        for (_, url) in lines {
            if seen.insert(url.clone()) {
                out.push_str(&url);
                out.push('\n');
            }
        }
        out
    }

    /// The info artifact: header block, histograms, parameter indices, forms,
    /// one line per dispatched request, then the exclusions.
    pub fn render_info(&self, meta: &ReportMeta) -> String {
        let mut report = String::new();

        report.push_str(&format!("Target:        {}\n", meta.start_url));
        report.push_str(&format!(
            "Started:       {}\n",
            meta.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
        report.push_str(&format!("Elapsed:       {:.2}s\n", meta.elapsed.as_secs_f64()));
        report.push_str(&format!("Pages:         {}\n", self.records.len()));
        report.push_str(&format!(
            "GET requests:  {} ({} parameters)\n",
            self.count_by_method(Method::Get),
            self.get_index.len()
        ));
        report.push_str(&format!(
            "POST requests: {} ({} parameters)\n",
            self.count_by_method(Method::Post),
            self.post_index.len()
        ));
        report.push('\n');

        report.push_str("# Extensions\n");
        for (label, count) in self.extension_histogram() {
            report.push_str(&format!("  {}: {}\n", label, count));
        }
        report.push('\n');

        report.push_str(&format!("# Top {} folders\n", TOP_FOLDERS));
        for (folder, count) in self.top_folders(TOP_FOLDERS) {
            report.push_str(&format!("  {}: {}\n", folder, count));
        }
        report.push('\n');

        push_index(&mut report, "# GET parameters", &self.get_index);
        push_index(&mut report, "# POST parameters", &self.post_index);

        let forms = self.unique_forms();
        if !forms.is_empty() {
            report.push_str("# Forms\n");
            for (key, method) in forms {
                report.push_str(&format!(
                    "  [depth {}] {} {} {}\n",
                    key.depth,
                    method,
                    key.action_url,
                    key.params.join(",")
                ));
            }
            report.push('\n');
        }

        report.push_str("# Requests\n");
        for record in self.sorted_records() {
            report.push_str(&request_line(record));
            report.push('\n');
        }

        for url in &self.logout_urls {
            report.push_str(&format!("URL: {} | ({})\n", url, SESSION_NOTE));
        }
        for url in &self.static_urls {
            report.push_str(&format!("URL: {} | ({})\n", url, STATIC_NOTE));
        }

        report
    }

    pub fn render_json(&self, meta: &ReportMeta) -> Result<String, serde_json::Error> {
        let forms: Vec<serde_json::Value> = self
            .unique_forms()
            .into_iter()
            .map(|(key, method)| {
                serde_json::json!({
                    "depth": key.depth,
                    "method": method,
                    "action_url": key.action_url,
                    "params": key.params,
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "report": {
                "metadata": {
                    "generator": "Burrow",
                    "version": env!("CARGO_PKG_VERSION"),
                    "target": meta.start_url,
                    "started_at": meta.started_at.to_rfc3339(),
                    "elapsed_seconds": meta.elapsed.as_secs_f64(),
                },
                "summary": {
                    "pages": self.records.len(),
                    "get_requests": self.count_by_method(Method::Get),
                    "post_requests": self.count_by_method(Method::Post),
                    "extensions": self.extension_histogram(),
                    "top_folders": self.top_folders(TOP_FOLDERS),
                },
                "parameters": {
                    "get": self.get_index,
                    "post": self.post_index,
                },
                "forms": forms,
                "requests": self.sorted_records(),
                "excluded": {
                    "logout": self.logout_urls,
                    "static": self.static_urls,
                }
            }
        });

        serde_json::to_string_pretty(&json_report)
    }
}

/// `URL: .. | Method: .. | Depth: .. | [GET/POST params] | Status: .. | Size: ..`
pub fn request_line(record: &CrawlRecord) -> String {
    let mut parts = vec![
        format!("URL: {}", record.url),
        format!("Method: {}", record.method),
        format!("Depth: {}", record.depth),
    ];
    if !record.get_params.is_empty() {
        parts.push(format!("GET: {}", record.get_params.join(",")));
        parts.push(format!("Nb_GET: {}", record.get_params.len()));
    }
    if !record.post_params.is_empty() {
        parts.push(format!("POST: {}", record.post_params.join(",")));
        parts.push(format!("Nb_POST: {}", record.post_params.len()));
    }
    parts.push(format!("Status: {}", record.status));
    parts.push(format!("Size: {}", record.body_size));
    parts.join(" | ")
}

fn push_index(report: &mut String, title: &str, index: &BTreeMap<String, BTreeSet<String>>) {
    if index.is_empty() {
        return;
    }
    report.push_str(title);
    report.push('\n');
    for (name, urls) in index {
        report.push_str(&format!("  {} ({})\n", name, urls.len()));
        for url in urls {
            report.push_str(&format!("    {}\n", url));
        }
    }
    report.push('\n');
}

/// `scheme://netloc/path/` without the sort query.
fn listing_directory(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let host = netloc(&parsed).unwrap_or_default();
    let path = parsed.path();
    let slash = if path.ends_with('/') { "" } else { "/" };
    format!("{}://{}{}{}", parsed.scheme(), host, path, slash)
}

/// Whether a record ended in a transport failure.
pub fn is_failure(record: &CrawlRecord) -> bool {
    record.status == Status::Error
}
