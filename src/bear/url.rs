//! URL construction and query-string handling.
//!
//! Outgoing values are percent-encoded with everything outside the RFC 3986
//! unreserved set escaped, so spaces become `%20` and commas `%2C`.

use std::borrow::Cow;

use super::BASE_URL;

/// Ordered query parameters, in the order they appear on the wire.
pub type QueryParams = Vec<(&'static str, String)>;

/// Percent-encodes a single query component.
pub fn encode(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Decodes a query component, treating `+` as a space.
///
/// Invalid escapes are kept literally rather than rejected.
pub fn decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Joins encoded `key=value` pairs with `&`.
pub fn encode_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds `bear://x-callback-url/<action>?<params>`.
pub fn bear_url<'a, I>(action: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let query = encode_query(params);
    if query.is_empty() {
        format!("{BASE_URL}/{action}")
    } else {
        format!("{BASE_URL}/{action}?{query}")
    }
}

/// Parses a query string into key-value pairs, keeping their order.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| {
            if pair.is_empty() {
                return None;
            }
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            if key.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("");
            Some((decode(key), decode(value)))
        })
        .collect()
}

/// Replaces the encoded token in a URL so it can be logged.
pub fn mask_token(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    url.replace(&format!("token={}", encode(token)), "token=***")
}
