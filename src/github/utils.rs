use regex::Regex;
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="([a-z]+)""#).expect("Invalid regexp"));

/// Deserialize as an optional string
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    use serde::de::Deserialize;
    match <Option<String>>::deserialize(deserializer) {
        Ok(v) => Ok(v.unwrap_or_default()),
        Err(e) => Err(e),
    }
}

/// Returns the URL with relation `rel` from a `Link` response header.
pub(crate) fn link_url(header: &str, rel: &str) -> Option<String> {
    LINK_RE
        .captures_iter(header)
        .find(|caps| &caps[2] == rel)
        .map(|caps| caps[1].to_string())
}
