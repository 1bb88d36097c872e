//!
//! src/merge.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Folds freshly fetched candidates into the stored snapshot. Pure
//! append/dedup: nothing is ever removed here, retention does that.
//!

use std::collections::HashSet;

use tracing::debug;

use crate::clock::RefTime;
use crate::matcher::Roster;
use crate::types::{format_found_at, format_updated_at, RawCandidate, Release, Snapshot};

/// Source badges that leak into the scraped title text
const TITLE_MARKERS: [&str; 2] = ["TITLE", "19금"];
const UNKNOWN_TITLE: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

pub fn normalize_title(raw: Option<&str>) -> String {
    let mut title = raw.unwrap_or_default().trim().to_string();
    for marker in TITLE_MARKERS {
        if title.contains(marker) {
            title = title.replace(marker, "").trim().to_string();
        }
    }
    if title.is_empty() { UNKNOWN_TITLE.to_string() } else { title }
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Build the next (pre-retention) snapshot from `existing` and `fetched`
pub fn merge(
    existing: Snapshot,
    fetched: &[RawCandidate],
    roster: &Roster,
    now: &RefTime
) -> (Snapshot, MergeStats) {
    let mut seen: HashSet<String> = existing.releases.iter()
        .map(|r| r.identity_key.clone())
        .collect();
    let mut stats = MergeStats::default();
    let mut found = Vec::new();
    let found_at = format_found_at(now);

    for candidate in fetched {
        let (Some(key), Some(artist_raw)) = (
            required(&candidate.identity_key),
            required(&candidate.artist_raw)
        ) else {
            stats.malformed += 1;
            debug!(?candidate, "merge.skip.malformed");
            continue;
        };

        // also guards against the same row appearing twice in one fetch
        if !seen.insert(key.to_string()) {
            stats.duplicates += 1;
            continue;
        }

        let is_tracked = roster.is_tracked(artist_raw);
        let artist_display = roster.resolve_display_name(artist_raw, is_tracked);

        found.push(Release {
            artist_display,
            title: normalize_title(candidate.title_raw.as_deref()),
            image_url: candidate.image_url.clone().unwrap_or_default(),
            identity_key: key.to_string(),
            discovered_at: found_at.clone(),
            is_tracked,
            artist_raw: Some(artist_raw.to_string()),
        });
    }

    stats.added = found.len();
    found.extend(existing.releases);

    let snapshot = Snapshot {
        updated_at: format_updated_at(now),
        tracked_artist_names: roster.sorted_names(),
        releases: found,
    };
    (snapshot, stats)
}
