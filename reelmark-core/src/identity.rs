//! Content identity derivation.
//!
//! A content key identifies *what* is being watched rather than *where* it
//! was watched from, so the same film resumed from two different URLs lands
//! on one record. The key is a 32-bit polynomial rolling hash over a basis
//! string:
//!
//! - `platform|series|<series>` for episodes that carry a series title
//! - `platform|title|<title>` otherwise, using the URL when the title is empty
//! - `platform|fallback|<url>` when neither yields anything usable, or when
//!   an episode's series title normalizes to nothing
//!
//! The arithmetic is fixed at 32-bit two's-complement wraparound over UTF-16
//! code units so keys written by earlier clients keep resolving. Unrelated
//! titles can collide; that risk is accepted.

use reelmark_model::{ContentKey, ContentType};

/// Lowercases `value` and drops everything that isn't ASCII alphanumeric.
pub fn normalize_token(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Everything before the first `?`.
pub fn url_without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}

/// `hash = (hash << 5) - hash + unit`, wrapping at every step.
pub fn rolling_hash(basis: &str) -> i32 {
    basis.encode_utf16().fold(0i32, |hash, unit| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    })
}

/// Builds the string the content key is hashed from.
pub fn identity_basis(
    url: Option<&str>,
    title: Option<&str>,
    platform: Option<&str>,
    content_type: Option<ContentType>,
    series_title: Option<&str>,
) -> String {
    let platform = platform.map(str::trim).unwrap_or_default().to_lowercase();
    let url_token = normalize_token(url_without_query(url.unwrap_or_default()));

    if content_type == Some(ContentType::Episode)
        && let Some(series_title) =
            series_title.filter(|series| !series.trim().is_empty())
    {
        let series = normalize_token(series_title);
        if series.is_empty() {
            return format!("{platform}|fallback|{url_token}");
        }
        return format!("{platform}|series|{series}");
    }

    let mut token = normalize_token(title.unwrap_or_default());
    if token.is_empty() {
        token = url_token.clone();
    }
    if token.is_empty() {
        return format!("{platform}|fallback|{url_token}");
    }
    format!("{platform}|title|{token}")
}

/// Derives the content key for a metadata tuple.
pub fn derive_key(
    url: Option<&str>,
    title: Option<&str>,
    platform: Option<&str>,
    content_type: Option<ContentType>,
    series_title: Option<&str>,
) -> ContentKey {
    let basis =
        identity_basis(url, title, platform, content_type, series_title);
    ContentKey::from_hash(rolling_hash(&basis).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("hello"), 99_162_322);
        assert_eq!(rolling_hash("netflix|title|heat"), -1_133_299_778);
    }

    #[test]
    fn minimum_hash_keeps_its_magnitude() {
        assert_eq!(i32::MIN.unsigned_abs(), 2_147_483_648);
        assert_eq!(
            ContentKey::from_hash(i32::MIN.unsigned_abs()).as_str(),
            "content_2147483648"
        );
    }

    #[test]
    fn key_is_deterministic() {
        let first = derive_key(
            Some("https://www.netflix.com/watch/1?t=10"),
            Some("Heat"),
            Some("Netflix"),
            Some(ContentType::Movie),
            None,
        );
        let second = derive_key(
            Some("https://www.netflix.com/watch/1?t=10"),
            Some("Heat"),
            Some("Netflix"),
            Some(ContentType::Movie),
            None,
        );
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "content_1133299778");
    }

    #[test]
    fn title_normalization_ignores_case_and_punctuation() {
        let plain = derive_key(None, Some("Heat"), Some("netflix"), None, None);
        let noisy =
            derive_key(None, Some("  H-E-A-T! "), Some(" NETFLIX "), None, None);
        assert_eq!(plain, noisy);
    }

    #[test]
    fn episodes_with_series_use_series_basis() {
        assert_eq!(
            identity_basis(
                Some("https://x/watch/1"),
                Some("Pilot"),
                Some("X"),
                Some(ContentType::Episode),
                Some("Show"),
            ),
            "x|series|show"
        );

        let episode = derive_key(
            Some("https://x/watch/1"),
            Some("Show"),
            Some("X"),
            Some(ContentType::Episode),
            Some("Show"),
        );
        let movie = derive_key(
            Some("https://x/watch/1"),
            Some("Show"),
            Some("X"),
            Some(ContentType::Movie),
            Some("Show"),
        );
        assert_ne!(episode, movie);
    }

    #[test]
    fn empty_title_falls_back_to_url_without_query() {
        assert_eq!(
            identity_basis(
                Some("https://youtube.com/watch?v=abc"),
                Some("!!!"),
                Some("YouTube"),
                None,
                None,
            ),
            "youtube|title|httpsyoutubecomwatch"
        );
    }

    #[test]
    fn degenerate_inputs_use_fallback_basis() {
        assert_eq!(identity_basis(None, None, None, None, None), "|fallback|");
        assert_eq!(
            identity_basis(
                Some("?only=query"),
                Some("???"),
                Some("Hulu"),
                Some(ContentType::Episode),
                Some("..."),
            ),
            "hulu|fallback|"
        );
    }

    #[test]
    fn series_without_usable_characters_falls_back_to_url() {
        for series in ["!!!", "進撃の巨人"] {
            assert_eq!(
                identity_basis(
                    Some("https://x/watch/1"),
                    Some("Pilot"),
                    Some("X"),
                    Some(ContentType::Episode),
                    Some(series),
                ),
                "x|fallback|httpsxwatch1"
            );
        }
        assert_eq!(
            identity_basis(
                Some("https://x/watch/1"),
                Some("Pilot"),
                Some("X"),
                Some(ContentType::Episode),
                Some("   "),
            ),
            "x|title|pilot"
        );
    }
}
