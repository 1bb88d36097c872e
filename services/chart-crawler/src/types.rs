use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::clock::{self, RefTime};

/// Minute precision, used for found_at
pub const FOUND_AT_FORMAT: &str = "%Y-%m-%d %H:%M";
/// Second precision, used for updated_at
pub const UPDATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Older crawlers wrote nulls and the odd non-string scalar; one such
// field must not make the whole file unreadable.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

// One discovered song release. Field names follow the on-disk json
// so that files written by older crawlers load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(rename = "artist", default, deserialize_with = "lenient_string")]
    pub artist_display: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "image", default, deserialize_with = "lenient_string")]
    pub image_url: String,
    #[serde(rename = "link", default, deserialize_with = "lenient_string")]
    pub identity_key: String,
    #[serde(rename = "found_at", default, deserialize_with = "lenient_string")]
    pub discovered_at: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_tracked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_raw: Option<String>,
}

impl Release {
    /// None when found_at is missing or malformed
    pub fn discovered_at(&self) -> Option<RefTime> {
        let naive = NaiveDateTime::parse_from_str(
            self.discovered_at.trim(), FOUND_AT_FORMAT
        ).ok()?;
        clock::localize(&naive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tracked_artist_names: Vec<String>,
    #[serde(rename = "songs", default, deserialize_with = "null_as_default")]
    pub releases: Vec<Release>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self { updated_at: String::new(), tracked_artist_names: Vec::new(), releases: Vec::new() }
    }
}

// What a source provider hands back for one listing row. Everything is
// optional; merge decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub artist_raw: Option<String>,
    pub title_raw: Option<String>,
    pub image_url: Option<String>,
    pub identity_key: Option<String>,
}

pub fn format_found_at(t: &RefTime) -> String {
    t.format(FOUND_AT_FORMAT).to_string()
}

pub fn format_updated_at(t: &RefTime) -> String {
    t.format(UPDATED_AT_FORMAT).to_string()
}
