//! Video URL parsing.

use crate::error::{Result, TekstError};
use regex::Regex;
use std::sync::OnceLock;

fn series_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"BV\w{10}").expect("Invalid regex"))
}

/// Extract the series identifier and 1-based part number from a video URL.
///
/// The page defaults to 1 when no `p` query parameter is present; that default
/// feeds the deterministic artifact naming (plain stem for page 1, `_p<N>`
/// suffix otherwise), so it must never change. The extractor does not verify
/// that the series exists; the metadata fetch is the first authority on that.
pub fn extract_series_and_page(input: &str) -> Result<(String, u32)> {
    let input = input.trim();

    let series_id = series_id_regex()
        .find(input)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TekstError::MalformedInput(format!("No series identifier found in: {}", input))
        })?;

    Ok((series_id, page_from_query(input).unwrap_or(1)))
}

/// Pull the `p` query parameter out of `input`.
///
/// Bare identifiers like `BV1wy4y1D7JT?p=3` have no scheme and fail a direct
/// URL parse, so they are re-parsed against a placeholder base.
fn page_from_query(input: &str) -> Option<u32> {
    let parsed = ::url::Url::parse(input)
        .or_else(|_| ::url::Url::parse(&format!("https://placeholder.invalid/{}", input)))
        .ok()?;

    parsed
        .query_pairs()
        .find(|(k, _)| k == "p")
        .and_then(|(_, v)| v.parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_page() {
        let url = "https://www.bilibili.com/video/BV1wy4y1D7JT/?p=3&spm_id_from=333.788";
        assert_eq!(
            extract_series_and_page(url).unwrap(),
            ("BV1wy4y1D7JT".to_string(), 3)
        );
    }

    #[test]
    fn test_page_defaults_to_one() {
        let url = "https://www.bilibili.com/video/BV1PT4y1e7UU/?vd_source=abc";
        assert_eq!(
            extract_series_and_page(url).unwrap(),
            ("BV1PT4y1e7UU".to_string(), 1)
        );
    }

    #[test]
    fn test_bare_id_accepted() {
        assert_eq!(
            extract_series_and_page("BV1pv411H78e").unwrap(),
            ("BV1pv411H78e".to_string(), 1)
        );
    }

    #[test]
    fn test_bare_id_with_page_query() {
        assert_eq!(
            extract_series_and_page("BV1wy4y1D7JT?p=3").unwrap(),
            ("BV1wy4y1D7JT".to_string(), 3)
        );
        assert_eq!(
            extract_series_and_page("BV1wy4y1D7JT?p=12&vd_source=y").unwrap(),
            ("BV1wy4y1D7JT".to_string(), 12)
        );
    }

    #[test]
    fn test_p_in_middle_of_query() {
        let url = "https://www.bilibili.com/video/BV1wy4y1D7JT/?spm_id_from=x&p=12&vd_source=y";
        assert_eq!(extract_series_and_page(url).unwrap().1, 12);
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(matches!(
            extract_series_and_page("https://example.com/watch?v=12345"),
            Err(TekstError::MalformedInput(_))
        ));
        assert!(extract_series_and_page("").is_err());
    }
}
