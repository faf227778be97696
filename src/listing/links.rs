//! Hyperlink extraction from directory-listing documents.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{CaptureMatches, Regex};
use tracing::{trace, warn};
use url::Url;

use super::suffix::TargetSuffix;

/// Matches the `href` attribute of an `<a>` start tag: double-quoted,
/// single-quoted, or bare.
#[allow(clippy::expect_used)]
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("href regex is valid") // Static pattern, safe to panic
});

/// One archive link discovered in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Absolute URL with the fragment removed.
    pub url: Url,
    /// Final path segment as it appears in the URL (still percent-encoded).
    pub raw_name: String,
}

/// A fetched listing document together with the URL it was served from.
#[derive(Debug, Clone)]
pub struct Listing {
    base_url: Url,
    document: String,
}

impl Listing {
    /// Wraps a listing document; relative links resolve against `base_url`.
    #[must_use]
    pub fn new(base_url: Url, document: impl Into<String>) -> Self {
        Self {
            base_url,
            document: document.into(),
        }
    }

    /// URL relative links are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Iterates the entries whose path ends with `suffix`, in document order.
    ///
    /// Each call starts a fresh scan of the same document.
    #[must_use]
    pub fn entries<'a>(&'a self, suffix: &'a TargetSuffix) -> ListingEntries<'a> {
        extract_links(&self.document, &self.base_url, suffix)
    }
}

/// Scans `document` for hyperlinks whose path ends with `suffix`.
///
/// Relative links are resolved against `base_url`. The returned iterator is
/// lazy; links that cannot be resolved are skipped with a warning.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use zipgrab_core::listing::{TargetSuffix, extract_links};
///
/// let base = Url::parse("https://example.com/roms/").unwrap();
/// let suffix = TargetSuffix::default();
/// let html = r#"<a href="Tetris.zip">Tetris</a> <a href="notes.txt">notes</a>"#;
/// let urls: Vec<String> = extract_links(html, &base, &suffix)
///     .map(|entry| entry.url.to_string())
///     .collect();
/// assert_eq!(urls, ["https://example.com/roms/Tetris.zip"]);
/// ```
#[must_use]
pub fn extract_links<'a>(
    document: &'a str,
    base_url: &'a Url,
    suffix: &'a TargetSuffix,
) -> ListingEntries<'a> {
    ListingEntries {
        captures: HREF_RE.captures_iter(document),
        base_url,
        suffix,
    }
}

/// Lazy iterator over the archive links of one document.
#[derive(Debug)]
pub struct ListingEntries<'a> {
    captures: CaptureMatches<'static, 'a>,
    base_url: &'a Url,
    suffix: &'a TargetSuffix,
}

impl Iterator for ListingEntries<'_> {
    type Item = RemoteEntry;

    fn next(&mut self) -> Option<Self::Item> {
        for caps in self.captures.by_ref() {
            let Some(raw) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
                continue;
            };
            let href = decode_html_entities(raw.as_str().trim());
            if !self.suffix.matches(href_path(&href)) {
                trace!(href = %href, "ignoring non-matching link");
                continue;
            }

            match resolve_href(self.base_url, &href) {
                Ok(url) if self.suffix.matches_url(&url) => {
                    let raw_name = url
                        .path_segments()
                        .and_then(|mut segments| segments.next_back())
                        .unwrap_or_default()
                        .to_string();
                    return Some(RemoteEntry { url, raw_name });
                }
                Ok(url) => {
                    trace!(href = %href, url = %url, "resolved link does not match suffix");
                }
                Err(reason) => {
                    warn!(href = %href, reason, "skipping unresolvable link");
                }
            }
        }
        None
    }
}

/// The part of an href before any query string or fragment.
fn href_path(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

fn resolve_href(base_url: &Url, href: &str) -> Result<Url, &'static str> {
    let mut url = base_url.join(href).map_err(|_| "malformed URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("unsupported scheme");
    }
    if url.host_str().is_none() {
        return Err("missing host");
    }
    url.set_fragment(None);
    Ok(url)
}

/// Decodes the character references that appear in listing attributes.
fn decode_html_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|ch| (ch, semi)));
        if let Some((ch, semi)) = decoded {
            out.push(ch);
            rest = &tail[semi + 1..];
        } else {
            out.push('&');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
