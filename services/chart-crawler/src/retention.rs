//!
//! src/retention.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Decides which releases survive into the next snapshot.
//!
//! Tracked releases live for a fixed elapsed window (90 days by default,
//! exclusive). Untracked releases live until the reference-zone calendar
//! date rolls over. A release whose found_at cannot be read is kept.
//!

use chrono::Duration;

use crate::clock::RefTime;
use crate::types::Release;
use crate::CrawlerError;

pub const DEFAULT_TRACKED_WINDOW_DAYS: i64 = 90;
/// Upper bound accepted for the tracked window
pub const MAX_TRACKED_WINDOW_DAYS: i64 = 36_500;

pub trait RetentionPolicy: Send + Sync {
    fn retains(&self, release: &Release, now: &RefTime) -> bool;

    fn apply(&self, releases: Vec<Release>, now: &RefTime) -> Vec<Release> {
        releases.into_iter()
            .filter(|r| self.retains(r, now))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AgingPolicy {
    pub tracked_window: Duration,
}

impl AgingPolicy {
    pub fn new(tracked_window_days: i64) -> Result<Self, CrawlerError> {
        if !(1..=MAX_TRACKED_WINDOW_DAYS).contains(&tracked_window_days) {
            return Err(CrawlerError::Config(format!(
                "tracked window must be 1..={MAX_TRACKED_WINDOW_DAYS} days, got {tracked_window_days}"
            )));
        }
        let tracked_window = Duration::try_days(tracked_window_days)
            .ok_or_else(|| CrawlerError::Config(format!("tracked window {tracked_window_days} days")))?;
        Ok( Self { tracked_window } )
    }
}

impl Default for AgingPolicy {
    fn default() -> Self {
        Self { tracked_window: Duration::days(DEFAULT_TRACKED_WINDOW_DAYS) }
    }
}

impl RetentionPolicy for AgingPolicy {
    fn retains(&self, release: &Release, now: &RefTime) -> bool {
        let Some(found) = release.discovered_at() else {
            return true;
        };

        if release.is_tracked {
            now.signed_duration_since(found) < self.tracked_window
        } else {
            found.date_naive() == now.date_naive()
        }
    }
}
