//! Attribute value codec.
//!
//! Directory attributes are strings. This module converts them to and from
//! the typed fields of the domain model:
//! - integers as decimal text
//! - dates as ISO-8601 `YYYY-MM-DD`
//! - string maps as a single `key=value,key=value` value
//! - birth day/month with `-1` meaning "not set"

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::entry::LdapEntry;

/// Flat attribute bag, ordered by attribute name.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// Stored value for an unset birth day or month.
pub const UNSET_NUMBER: i32 = -1;

/// Returns the first value of an attribute, or an empty string.
#[must_use]
pub fn string(entry: &LdapEntry, attr: &str) -> String {
    entry.get_attr(attr).unwrap_or_default().to_string()
}

/// Parses an unsigned integer attribute.
#[must_use]
pub fn unsigned(entry: &LdapEntry, attr: &str) -> Option<u32> {
    entry.get_attr(attr).and_then(|v| v.trim().parse().ok())
}

/// Parses a signed integer attribute.
#[must_use]
pub fn signed(entry: &LdapEntry, attr: &str) -> Option<i64> {
    entry.get_attr(attr).and_then(|v| v.trim().parse().ok())
}

/// Parses an ISO date attribute. Absent or malformed values yield `None`.
#[must_use]
pub fn date(entry: &LdapEntry, attr: &str) -> Option<NaiveDate> {
    let raw = entry.get_attr(attr)?;
    match parse_date(raw) {
        Some(date) => Some(date),
        None => {
            tracing::warn!(dn = %entry.dn, attr, value = raw, "could not parse date");
            None
        }
    }
}

/// Parses `YYYY-MM-DD`.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Formats a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Decodes a birth day or month, treating `-1` and out-of-range values as unset.
#[must_use]
pub fn birth_part(entry: &LdapEntry, attr: &str) -> Option<u8> {
    signed(entry, attr)
        .filter(|v| *v > 0)
        .and_then(|v| u8::try_from(v).ok())
}

/// Encodes a birth day or month.
#[must_use]
pub fn encode_birth_part(value: Option<u8>) -> String {
    value.map_or(UNSET_NUMBER, i32::from).to_string()
}

/// Decodes a `key=value,key=value` map. `defaults` are present with an
/// empty value unless overridden.
#[must_use]
pub fn decode_map(value: Option<&str>, defaults: &[String]) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = defaults
        .iter()
        .map(|key| (key.clone(), String::new()))
        .collect();
    if let Some(value) = value {
        for pair in value.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, val) = pair.split_once('=').unwrap_or((pair, ""));
            map.insert(key.trim().to_string(), val.trim().to_string());
        }
    }
    map
}

/// Encodes a map as `key=value,key=value`, skipping empty values.
#[must_use]
pub fn encode_map(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inserts a single-valued attribute, skipping blank values.
pub fn put(map: &mut AttributeMap, attr: &str, value: impl Into<String>) {
    let value = value.into();
    if !value.trim().is_empty() {
        map.insert(attr.to_string(), vec![value]);
    }
}

/// Inserts a multi-valued attribute, skipping empty lists.
pub fn put_all<I, S>(map: &mut AttributeMap, attr: &str, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    if !values.is_empty() {
        map.insert(attr.to_string(), values);
    }
}
