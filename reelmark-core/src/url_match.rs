//! Fuzzy URL comparison used when looking records up by page address.

use url::Url;

/// Reduces `url` to scheme, host and path, dropping query and fragment.
///
/// Unparseable input is cut at the first `#` and then at the first `?`.
pub fn normalize(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => {
                let port = parsed
                    .port()
                    .map(|port| format!(":{port}"))
                    .unwrap_or_default();
                Some(format!(
                    "{}://{}{}{}",
                    parsed.scheme(),
                    host,
                    port,
                    parsed.path()
                ))
            }
            None => Some(format!("{}:{}", parsed.scheme(), parsed.path())),
        },
        Err(_) => {
            let without_fragment =
                trimmed.split_once('#').map_or(trimmed, |(head, _)| head);
            let without_query = without_fragment
                .split_once('?')
                .map_or(without_fragment, |(head, _)| head);
            Some(without_query.to_string())
        }
    }
}

/// Equal once normalized, or one raw string contains the other.
pub fn roughly_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }

    if let (Some(left), Some(right)) = (normalize(a), normalize(b))
        && left == right
    {
        return true;
    }

    a.contains(b) || b.contains(a)
}
