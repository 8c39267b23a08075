// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub(crate) mod bcf_utils;

use std::fmt::Write;

/// Characters that separate list items, fields or key/value pairs inside an INFO column.
const RESERVED: &[char] = &['%', ':', ',', ';', '=', ' ', '\t'];

/// Percent-encode characters of `value` that would break list or field
/// separation when written as an element of a VCF INFO list.
///
/// # Example
/// assert_eq!(escape_list_item("MantaBND:244:0"), "MantaBND%3A244%3A0");
pub(crate) fn escape_list_item(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if RESERVED.contains(&c) {
            // writing into a String cannot fail
            let _ = write!(escaped, "%{:02X}", c as u32);
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Strip the quotes htslib keeps around header values like `Description`.
pub(crate) fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
