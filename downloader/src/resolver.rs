/// Unwraps proxied asset URLs before fetching.
///
/// Catalog URLs frequently point at an image proxy carrying the real asset in
/// a `url` query parameter, sometimes protocol-relative (`//cdn/...`).
use url::Url;

/// Result of resolving an original catalog URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A usable fetch target, possibly identical to the original.
    Resolved(String),
    /// Nothing usable could be extracted; fetch the original as-is.
    Fallback(String),
}

impl Resolution {
    /// The string to hand to the fetch engine.
    pub fn target(&self) -> &str {
        match self {
            Resolution::Resolved(target) | Resolution::Fallback(target) => target,
        }
    }
}

/// Extract the real asset URL from a possibly wrapped one.
pub fn resolve(original: &str) -> Resolution {
    let parsed = match Url::parse(original) {
        Ok(parsed) => parsed,
        Err(_) => return Resolution::Fallback(original.to_string()),
    };

    let candidate = parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| original.to_string());

    // Scheme is supplied at request time
    let candidate = match candidate.strip_prefix("//") {
        Some(rest) => rest.to_string(),
        None => candidate,
    };

    if parse_target(&candidate).is_some() {
        Resolution::Resolved(candidate)
    } else {
        Resolution::Fallback(original.to_string())
    }
}

/// Parse a fetch target, assuming `https` when no scheme is present.
///
/// Only targets with a host are accepted.
pub fn parse_target(target: &str) -> Option<Url> {
    let target = target.trim();
    let target = target.strip_prefix("//").unwrap_or(target);
    let url = if target.contains("://") {
        Url::parse(target).ok()?
    } else {
        Url::parse(&format!("https://{}", target)).ok()?
    };
    url.has_host().then_some(url)
}

/// Hostname of a fetch target, if it has one.
pub fn host_of(target: &str) -> Option<String> {
    parse_target(target).and_then(|url| url.host_str().map(str::to_string))
}
