//! Query-string helpers shared by the redirect parser and the graph client.

use crate::error::Result;
use serde::Serialize;

/// Split `s` on `&`, then each pair on its first `=`, form-decoding both
/// halves: percent escapes are decoded and `+` becomes a space.
///
/// A leading `?` or `#` is ignored. Pairs without `=` map to an empty value.
pub fn parse_query_string(s: &str) -> Vec<(String, String)> {
    let s = s.trim_start_matches(['?', '#']);
    url::form_urlencoded::parse(s.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Look up the first value for `key` in an already parsed query.
pub fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Form-encode `params` as `k=v&k=v`.
pub fn to_query_string<T: Serialize + ?Sized>(params: &T) -> Result<String> {
    Ok(serde_urlencoded::to_string(params)?)
}
