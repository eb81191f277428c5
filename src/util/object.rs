use crate::util::path::DELIMITER;

/// Host portion of a configured endpoint, with any scheme and trailing
/// slashes removed.
pub fn endpoint_host(endpoint: &str) -> &str {
    let host = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);

    host.trim_end_matches(DELIMITER)
}

pub fn scheme(ssl: bool) -> &'static str {
    if ssl {
        "https"
    } else {
        "http"
    }
}

/// Percent-encodes each segment of a key, keeping the delimiters.
pub fn encode_key(key: &str) -> String {
    key.split(DELIMITER)
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn object_url(ssl: bool, host: &str, key: &str) -> String {
    format!(
        "{}://{}/{}",
        scheme(ssl),
        host,
        encode_key(key.trim_start_matches(DELIMITER))
    )
}
