//! Picks a profile image out of fetched markup.
//!
//! Matching is deliberately strict: an image is only a candidate when its
//! `alt` text contains one of the agent's name tokens. Generic site
//! photography (office shots, logos, stock images) is never chosen, even when
//! it is the only image on the page.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::EnrichError;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("Invalid img selector"));

/// An `<img>` element as found in the page. Missing attributes are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateImage {
    pub source_url: String,
    pub alt_text: String,
}

/// Returns the absolute URL of the first image whose alt text mentions the
/// name, or `None`.
pub fn resolve(markup: &[u8], full_name: &str, base_url: &str) -> Option<String> {
    resolve_image(markup, full_name, base_url).ok()
}

/// Like [`resolve`], but reports why nothing was selected.
pub fn resolve_image(markup: &[u8], full_name: &str, base_url: &str) -> Result<String, EnrichError> {
    let tokens = name_tokens(full_name);
    if tokens.is_empty() {
        return Err(EnrichError::NoMatch(full_name.to_string()));
    }

    let candidates = extract_candidates(markup);
    tracing::debug!(count = candidates.len(), base_url, "extracted image candidates");

    let mut unusable = None;
    for candidate in &candidates {
        let src = candidate.source_url.trim();
        if src.is_empty() {
            continue;
        }
        let alt = candidate.alt_text.to_lowercase();
        if !tokens.iter().any(|token| alt.contains(token.as_str())) {
            continue;
        }
        match normalize_src(src, base_url) {
            Some(url) => return Ok(url),
            None => {
                tracing::debug!(src, "matching image has an unsupported src form, skipping");
                unusable.get_or_insert_with(|| src.to_string());
            }
        }
    }

    match unusable {
        Some(src) if src.starts_with('/') => Err(EnrichError::Parse(format!(
            "cannot resolve '{}' against '{}'",
            src, base_url
        ))),
        _ => Err(EnrichError::NoMatch(full_name.to_string())),
    }
}

/// Every `<img>` element in document order.
///
/// The HTML5 parser recovers from broken markup, so this never fails; bytes
/// that are not valid UTF-8 are replaced rather than rejected.
pub fn extract_candidates(markup: &[u8]) -> Vec<CandidateImage> {
    let html = String::from_utf8_lossy(markup);
    let document = Html::parse_document(&html);

    document
        .select(&IMG_SELECTOR)
        .map(|el| CandidateImage {
            source_url: el.value().attr("src").unwrap_or_default().to_string(),
            alt_text: el.value().attr("alt").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Lower-cased whitespace-separated tokens of a name.
pub fn name_tokens(full_name: &str) -> Vec<String> {
    full_name
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Makes an image `src` absolute.
///
/// - `//host/path` gets `https:` prepended verbatim.
/// - `/path` is joined onto `base_url`'s origin.
/// - `http://…` and `https://…` are returned unchanged.
/// - Anything else (bare relative paths, `data:` URIs) is unsupported.
///
/// An unsupported `src` does not end resolution. [`resolve_image`] skips
/// that element and keeps scanning, so a later name-matching image with a
/// usable `src` can still be selected. First-match-wins therefore applies
/// to the first matching element whose `src` normalizes.
pub fn normalize_src(src: &str, base_url: &str) -> Option<String> {
    if src.starts_with("//") {
        return Some(format!("https:{}", src));
    }
    if src.starts_with('/') {
        let base = Url::parse(base_url).ok()?;
        return base.join(src).ok().map(String::from);
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    // TODO: join bare relative paths against the page URL once the
    // directory owners confirm they want the wider match.
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/agents";

    #[test]
    fn test_root_relative_resolves_against_origin() {
        let html = br#"<html><body>
            <img alt="Jane Smith - Top Agent" src="/photos/jane.jpg">
        </body></html>"#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://example.com/photos/jane.jpg")
        );
    }

    #[test]
    fn test_single_unrelated_image_is_not_chosen() {
        let html = br#"<img alt="Our downtown office" src="/office.jpg">"#;
        assert_eq!(resolve(html, "Jane Smith", BASE), None);
        assert_eq!(
            resolve_image(html, "Jane Smith", BASE),
            Err(EnrichError::NoMatch("Jane Smith".to_string()))
        );
    }

    #[test]
    fn test_scheme_relative_gets_https_prefix_verbatim() {
        let html = br#"<img alt="jane" src="//cdn.example.com/x.jpg">"#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://cdn.example.com/x.jpg")
        );
    }

    #[test]
    fn test_absolute_src_unchanged() {
        let html = br#"<img alt="Smith headshot" src="http://img.example.org/s.png">"#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("http://img.example.org/s.png")
        );
    }

    #[test]
    fn test_first_match_wins() {
        let html = br#"
            <img alt="Logo" src="/logo.png">
            <img alt="Jane at an open house" src="/first.jpg">
            <img alt="Jane Smith portrait, high resolution" src="/second.jpg">
        "#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://example.com/first.jpg")
        );
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let html = br#"<img alt="MEET JANEY!" src="/j.jpg">"#;
        assert!(resolve(html, "jane", BASE).is_some());
    }

    #[test]
    fn test_empty_src_skipped_for_next_match() {
        let html = br#"
            <img alt="Jane Smith" src="">
            <img alt="Jane Smith" >
            <img alt="Jane Smith again" src="/ok.jpg">
        "#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://example.com/ok.jpg")
        );
    }

    #[test]
    fn test_bare_relative_src_is_unhandled() {
        let html = br#"<img alt="Jane Smith" src="images/jane.jpg">"#;
        assert_eq!(resolve(html, "Jane Smith", BASE), None);
    }

    #[test]
    fn test_bare_relative_then_usable_match() {
        let html = br#"
            <img alt="Jane Smith" src="images/jane.jpg">
            <img alt="Jane Smith" src="/photos/jane.jpg">
        "#;
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://example.com/photos/jane.jpg")
        );
    }

    #[test]
    fn test_root_relative_with_unusable_base() {
        let html = br#"<img alt="Jane Smith" src="/photos/jane.jpg">"#;
        assert!(matches!(
            resolve_image(html, "Jane Smith", "janesmith-homes"),
            Err(EnrichError::Parse(_))
        ));
    }

    #[test]
    fn test_blank_name_never_matches() {
        let html = br#"<img alt="anything" src="/a.jpg">"#;
        assert_eq!(resolve(html, "   ", BASE), None);
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = b"<div><p>unclosed <img alt='Jane Smith' src='/j.jpg'><table><img alt=x src=/y></div></span>\xff\xfe";
        assert_eq!(extract_candidates(html).len(), 2);
        assert_eq!(
            resolve(html, "Jane Smith", BASE).as_deref(),
            Some("https://example.com/j.jpg")
        );
    }

    #[test]
    fn test_candidates_keep_document_order() {
        let html = br#"<img src="/a.jpg" alt="a"><img src="/b.jpg"><img alt="c">"#;
        let candidates = extract_candidates(html);
        assert_eq!(
            candidates,
            vec![
                CandidateImage {
                    source_url: "/a.jpg".into(),
                    alt_text: "a".into()
                },
                CandidateImage {
                    source_url: "/b.jpg".into(),
                    alt_text: String::new()
                },
                CandidateImage {
                    source_url: String::new(),
                    alt_text: "c".into()
                },
            ]
        );
    }
}
