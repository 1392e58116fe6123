//! Search URL construction and link decoding
//!
//! Builds the registry search URL for a term/page and turns the pagination
//! and suggestion links found in returned markup back into search targets.
//! Nothing in here fails: malformed input degrades to empty/default values.

use std::collections::HashMap;
use tracing::debug;

/// Query parameter carrying the search term
pub const TERM_PARAM: &str = "Term";
/// Query parameter carrying the 1-based page number
pub const PAGE_PARAM: &str = "PageNumber";
/// Query parameter carrying the page size
pub const PAGE_SIZE_PARAM: &str = "PageSize";

/// Where a pagination link points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub page: u32,
    /// Term carried on the link itself, if any
    pub term_override: Option<String>,
}

/// Build the outbound search URL.
///
/// Parameter order is fixed (`Term`, `PageNumber`, `PageSize`). The caller
/// trims `term` and rejects empty input before calling.
pub fn build_search_url(
    base_url: &str,
    endpoint_path: &str,
    term: &str,
    page: u32,
    page_size: u32,
) -> String {
    format!(
        "{}{}?{}={}&{}={}&{}={}",
        base_url.trim_end_matches('/'),
        endpoint_path,
        TERM_PARAM,
        urlencoding::encode(term),
        PAGE_PARAM,
        page,
        PAGE_SIZE_PARAM,
        page_size
    )
}

/// Parse a URL or bare query string into key/value pairs.
///
/// Absent or unusable input yields an empty map. For repeated keys the last
/// occurrence wins. Keys are case-sensitive.
pub fn decode_query_params(input: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return params;
    };

    let query = match raw.split_once('?') {
        Some((_, query)) => query,
        // A bare query string has no scheme and no path
        None if raw.contains("://") || raw.starts_with('/') || !raw.contains('=') => {
            debug!(input = raw, "no query string present");
            return params;
        }
        None => raw,
    };
    let query = query.split('#').next().unwrap_or_default();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        params.insert(key.into_owned(), value.into_owned());
    }

    params
}

/// Decode a pagination link into the page it targets.
///
/// The page defaults to 1 when missing, non-numeric or zero. A non-empty
/// `Term` on the link is reported as an override.
pub fn resolve_pagination_target(link_href: &str) -> PageTarget {
    let params = decode_query_params(Some(link_href));

    let page = params
        .get(PAGE_PARAM)
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or_else(|| {
            if params.contains_key(PAGE_PARAM) {
                debug!(href = link_href, "unusable page number on pagination link");
            }
            1
        });

    let term_override = params
        .get(TERM_PARAM)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    PageTarget {
        page,
        term_override,
    }
}

/// Decode the term a "did you mean" suggestion link searches for.
///
/// Suggestion links have used both `Term` and `term`; when neither is usable
/// the visible link text is the term.
pub fn resolve_suggestion_term(link_href: &str, link_text: &str) -> String {
    let params = decode_query_params(Some(link_href));
    [TERM_PARAM, "term"]
        .iter()
        .filter_map(|key| params.get(*key))
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .unwrap_or(link_text.trim())
        .to_string()
}

/// Resolve an href found in registry markup to an absolute URL.
///
/// Absolute URLs pass through, protocol-relative ones get `https:`, and
/// root-relative paths are prefixed with `base_url`. Fragment-only hrefs and
/// anything else unusable are returned unchanged.
pub fn resolve_href(base_url: &str, href: &str) -> String {
    let href = href.trim();
    let base = base_url.trim_end_matches('/');

    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", base, href)
    } else if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        href.to_string()
    } else {
        match url::Url::parse(&format!("{}/", base)).and_then(|b| b.join(href)) {
            Ok(resolved) => resolved.to_string(),
            Err(e) => {
                debug!(href, error = %e, "href kept unresolved");
                href.to_string()
            }
        }
    }
}

/// Whether `url` is just the site root (decorative links point there)
pub fn is_site_root(base_url: &str, url: &str) -> bool {
    url.trim_end_matches('/') == base_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://irc.fda.gov.ir";

    #[test]
    fn test_build_search_url_parameter_order() {
        let url = build_search_url(BASE, "/nfi/Search", "aspirin", 3, 12);
        assert_eq!(
            url,
            "https://irc.fda.gov.ir/nfi/Search?Term=aspirin&PageNumber=3&PageSize=12"
        );
    }

    #[test]
    fn test_build_search_url_encodes_term() {
        let url = build_search_url("https://irc.fda.gov.ir/", "/nfi/Search", "استامینوفن 500", 1, 12);
        assert!(url.starts_with("https://irc.fda.gov.ir/nfi/Search?Term=%D8%A7"));
        assert!(url.contains("%20500&PageNumber=1&PageSize=12"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_decode_query_params() {
        let params = decode_query_params(Some("?Term=aspirin&PageNumber=3"));
        assert_eq!(params.len(), 2);
        assert_eq!(params["Term"], "aspirin");
        assert_eq!(params["PageNumber"], "3");
    }

    #[test]
    fn test_decode_query_params_empty_inputs() {
        assert!(decode_query_params(Some("")).is_empty());
        assert!(decode_query_params(None).is_empty());
        assert!(decode_query_params(Some("   ")).is_empty());
        assert!(decode_query_params(Some("https://irc.fda.gov.ir/nfi/Search")).is_empty());
        assert!(decode_query_params(Some("not a query")).is_empty());
    }

    #[test]
    fn test_decode_query_params_full_url_and_bare_string() {
        let params = decode_query_params(Some(
            "https://irc.fda.gov.ir/nfi/Search?Term=%D8%A8%D8%B1%D9%88%D9%81%D9%86&PageNumber=2#top",
        ));
        assert_eq!(params["Term"], "بروفن");
        assert_eq!(params["PageNumber"], "2");

        let params = decode_query_params(Some("Term=a+b&PageSize=12"));
        assert_eq!(params["Term"], "a b");
        assert_eq!(params["PageSize"], "12");
    }

    #[test]
    fn test_decode_query_params_last_key_wins() {
        let params = decode_query_params(Some("/nfi/Search?PageNumber=1&PageNumber=4"));
        assert_eq!(params["PageNumber"], "4");
    }

    #[test]
    fn test_resolve_pagination_target() {
        let target = resolve_pagination_target("/nfi/Search?Term=aspirin&PageNumber=5&PageSize=12");
        assert_eq!(target.page, 5);
        assert_eq!(target.term_override.as_deref(), Some("aspirin"));

        let target = resolve_pagination_target("/nfi/Search?PageNumber=2");
        assert_eq!(target.page, 2);
        assert_eq!(target.term_override, None);
    }

    #[test]
    fn test_resolve_pagination_target_defaults_to_first_page() {
        assert_eq!(resolve_pagination_target("/nfi/Search?PageNumber=abc").page, 1);
        assert_eq!(resolve_pagination_target("/nfi/Search?PageNumber=0").page, 1);
        assert_eq!(resolve_pagination_target("#").page, 1);
        assert_eq!(resolve_pagination_target("/nfi/Search?Term=").term_override, None);
    }

    #[test]
    fn test_resolve_suggestion_term() {
        assert_eq!(resolve_suggestion_term("/nfi/Search?term=ibuprofen", "Ibuprofen"), "ibuprofen");
        assert_eq!(resolve_suggestion_term("/nfi/Search?Term=Brufen", "x"), "Brufen");
        assert_eq!(resolve_suggestion_term("#", "  Gelofen "), "Gelofen");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href(BASE, "/nfi/Detail/123"), "https://irc.fda.gov.ir/nfi/Detail/123");
        assert_eq!(resolve_href(BASE, "https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(resolve_href(BASE, "//cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(resolve_href(BASE, "#"), "#");
        assert_eq!(resolve_href(BASE, "images/a.png"), "https://irc.fda.gov.ir/images/a.png");
    }

    #[test]
    fn test_is_site_root() {
        assert!(is_site_root(BASE, "https://irc.fda.gov.ir/"));
        assert!(is_site_root(BASE, "https://irc.fda.gov.ir"));
        assert!(!is_site_root(BASE, "https://irc.fda.gov.ir/img/1.jpg"));
    }
}
