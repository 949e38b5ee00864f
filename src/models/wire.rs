//! Serde helpers for the backend's loosely typed JSON.
//!
//! The REST collaborator sends dates as full ISO timestamps, effort as a
//! decimal string, and sometimes `null` where an array is expected. These
//! helpers accept all of those shapes and write back the canonical one.

use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Parse `2024-01-10` or an RFC 3339 timestamp. Timestamps are read as a
/// calendar day in the local time zone.
pub fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = raw.parse::<Date>() {
        return Some(date);
    }
    raw.parse::<Timestamp>()
        .ok()
        .map(|ts| ts.to_zoned(TimeZone::system()).date())
}

pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'"))),
    }
}

/// For patch fields: absent stays `None`, an explicit `null` becomes
/// `Some(None)`.
pub fn patch_date<'de, D>(deserializer: D) -> Result<Option<Option<Date>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_date(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

pub fn lenient_hours<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number '{text}'"))),
    }
}

pub fn patch_hours<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_hours(deserializer).map(Some)
}

/// Effort goes over the wire as a decimal string.
pub fn hours_as_string<S>(hours: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match hours {
        Some(h) => serializer.serialize_str(&h.to_string()),
        None => serializer.serialize_none(),
    }
}

pub fn patch_hours_as_string<S>(hours: &Option<Option<f64>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match hours {
        Some(inner) => hours_as_string(inner, serializer),
        None => serializer.serialize_none(),
    }
}

/// `null` or a missing array both mean "no entries"; ids are stringified.
pub fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Generic `Option<Option<T>>` reader for nullable patch fields.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
