//!
//! src/matcher.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Decides whether a scraped artist string belongs to the tracked roster
//! and resolves the name shown to users.
//!
//! Short purely alphanumeric terms (<= 3 chars, e.g. "IU", "XG") must sit on
//! word boundaries; anything else is a plain case-insensitive substring.
//!

use serde::Deserialize;

const SHORT_TERM_MAX: usize = 3;

/// (match term, display override) pair from configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameRule {
    pub term: String,
    pub display: String,
}

impl NameRule {
    pub fn new(term: impl Into<String>, display: impl Into<String>) -> Self {
        Self { term: term.into(), display: display.into() }
    }
}

/// Immutable roster + override rules, loaded once and passed by reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub artists: Vec<String>,
    pub name_rules: Vec<NameRule>,
}

impl Roster {
    pub fn new(artists: Vec<String>, name_rules: Vec<NameRule>) -> Self {
        Self { artists, name_rules }
    }

    pub fn is_tracked(&self, raw_artist: &str) -> bool {
        is_tracked(raw_artist, &self.artists)
    }

    pub fn resolve_display_name(&self, raw_artist: &str, tracked: bool) -> String {
        resolve_display_name(raw_artist, tracked, &self.name_rules)
    }

    /// Roster mirrored into the snapshot, alphabetical
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names = self.artists.clone();
        names.sort();
        names
    }
}

fn is_short_token(term: &str) -> bool {
    term.chars().count() <= SHORT_TERM_MAX
        && term.chars().all(|c| c.is_ascii_alphanumeric())
}

fn bounded_at(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Core matching rule shared by classification and display resolution
pub fn term_matches(term: &str, raw_artist: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let text = raw_artist.to_lowercase();

    if is_short_token(&term) {
        text.match_indices(term.as_str())
            .any(|(start, m)| bounded_at(&text, start, start + m.len()))
    } else {
        text.contains(term.as_str())
    }
}

pub fn is_tracked<S: AsRef<str>>(raw_artist: &str, roster: &[S]) -> bool {
    roster.iter().any(|term| term_matches(term.as_ref(), raw_artist))
}

/// First matching rule in configuration order wins; untracked keep raw text
pub fn resolve_display_name(raw_artist: &str, tracked: bool, rules: &[NameRule]) -> String {
    if !tracked {
        return raw_artist.to_string();
    }
    rules.iter()
        .find(|rule| term_matches(&rule.term, raw_artist))
        .map(|rule| rule.display.clone())
        .unwrap_or_else(|| raw_artist.to_string())
}
