//! Canonical URL form used as the dedup key.
//!
//! Every visited-set lookup goes through [`normalize`]; two URLs that differ
//! only by query-parameter order, fragment, duplicate path separators or a
//! trailing separator map to the same string.

use url::Url;
use url::form_urlencoded;

/// Returns the canonical string for `url`.
///
/// Unparseable input is returned with its fragment dropped and otherwise
/// untouched, so the function is total and idempotent.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return strip_fragment(trimmed).to_string();
    };

    parsed.set_fragment(None);

    if !parsed.cannot_be_a_base() {
        let path = canonical_path(parsed.path());
        parsed.set_path(&path);
    }

    let query = parsed.query().map(sorted_query);
    match query {
        Some(q) if !q.is_empty() => parsed.set_query(Some(&q)),
        _ => parsed.set_query(None),
    }

    parsed.to_string()
}

/// Collapses runs of `/` and strips one trailing `/` unless the path is root.
fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(c);
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Re-encodes the query with pairs sorted by key. The sort is stable, so
/// repeated keys keep their relative order.
fn sorted_query(query: &str) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}
