// # List Element Escaping
//
// Elements of a list-valued identifier field are query-escaped before being
// joined with ',' so that literal commas and slashes cannot corrupt parsing.
// Spaces are written as '+', every other reserved byte as %XX.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Escape one list element
pub fn escape_element(element: &str) -> String {
    urlencoding::encode(element).replace("%20", "+")
}

/// Reverse [`escape_element`]
///
/// Rejects truncated or non-hex `%` sequences and escapes that decode to
/// invalid UTF-8.
pub fn unescape_element(escaped: &str) -> Result<String> {
    let bytes = escaped.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(malformed(escaped));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = escaped.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|_| malformed(escaped))
}

fn malformed(escaped: &str) -> Error {
    Error::format(format!("list element '{escaped}' is not URL encoded"))
}
