//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use att_core::{PersonName, ReferenceZone};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

/// Characters allowed in a person's name.
static NAME_REJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\s'\-]").unwrap());

/// Characters allowed in a username handle.
static USERNAME_REJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_\-]").unwrap());

/// Longest name kept after sanitizing, in characters.
const MAX_NAME_CHARS: usize = 50;

/// Strips everything but letters, whitespace, apostrophes and hyphens, then
/// trims and truncates to [`MAX_NAME_CHARS`].
pub fn sanitize_name(name: &str) -> String {
    let cleaned = NAME_REJECT_RE.replace_all(name, "");
    cleaned
        .trim()
        .chars()
        .take(MAX_NAME_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Strips everything but ASCII alphanumerics, underscores and hyphens.
pub fn sanitize_username(username: &str) -> String {
    USERNAME_REJECT_RE.replace_all(username, "").into_owned()
}

/// Builds a validated name from raw first and last name input.
pub fn person_name(first: &str, last: Option<&str>) -> anyhow::Result<PersonName> {
    let first = sanitize_name(first);
    let last = last.map(sanitize_name);
    PersonName::new(first, last).context("name must contain at least one letter")
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {s}. Use YYYY-MM-DD (e.g., 2025-01-31)"))
}

/// Parses an optional date, defaulting to today in `zone`.
pub fn date_or_today(
    s: Option<&str>,
    zone: ReferenceZone,
    now: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    s.map_or_else(|| Ok(zone.date_of(now)), parse_date)
}
