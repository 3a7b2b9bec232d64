// ── Health status ──
//
// Five health categories, the per-location device counters, and the
// rule that folds counters into one representative status.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Device health category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
    Ok,
    Problem,
    Critical,
    Unknown,
    Deactivated,
}

impl Status {
    /// Tie-break order, most severe first.
    pub const PRIORITY: [Status; 5] = [
        Status::Critical,
        Status::Problem,
        Status::Ok,
        Status::Unknown,
        Status::Deactivated,
    ];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Default display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Problem => "PROBLEM",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
            Self::Deactivated => "DEACTIVATED",
        }
    }

    /// Parse a server status string: a status name, or a colour from the
    /// default palette. Anything unrecognised is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<Self>()
            .ok()
            .or_else(|| StatusPalette::default().status_for_color(raw))
            .unwrap_or(Self::Unknown)
    }
}

// ── StatusCounts ────────────────────────────────────────────────────

/// Number of devices in each status at one location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCounts {
    pub ok: u32,
    pub problem: u32,
    pub critical: u32,
    pub unknown: u32,
    pub deactivated: u32,
}

impl StatusCounts {
    /// Counts with `n` devices in a single status.
    pub fn single(status: Status, n: u32) -> Self {
        let mut counts = Self::default();
        counts.set(status, n);
        counts
    }

    pub fn get(&self, status: Status) -> u32 {
        match status {
            Status::Ok => self.ok,
            Status::Problem => self.problem,
            Status::Critical => self.critical,
            Status::Unknown => self.unknown,
            Status::Deactivated => self.deactivated,
        }
    }

    pub fn set(&mut self, status: Status, n: u32) {
        match status {
            Status::Ok => self.ok = n,
            Status::Problem => self.problem = n,
            Status::Critical => self.critical = n,
            Status::Unknown => self.unknown = n,
            Status::Deactivated => self.deactivated = n,
        }
    }

    /// Count one more device in `status`.
    pub fn add(&mut self, status: Status) {
        self.set(status, self.get(status).saturating_add(1));
    }

    pub fn total(&self) -> u64 {
        Status::PRIORITY
            .iter()
            .map(|s| u64::from(self.get(*s)))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The representative status for these counts. See [`resolve_status`].
    pub fn resolve(&self) -> Status {
        resolve_status(self)
    }
}

impl FromIterator<Status> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut counts = Self::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

/// Fold counters into one status.
///
/// A status holding a strict majority of the devices wins. Otherwise the
/// first status in [`Status::PRIORITY`] with a non-zero count wins. No
/// devices at all resolves to `Unknown`.
pub fn resolve_status(counts: &StatusCounts) -> Status {
    let total = counts.total();
    if let Some(majority) = Status::PRIORITY
        .into_iter()
        .find(|s| u64::from(counts.get(*s)) * 2 > total)
    {
        return majority;
    }
    Status::PRIORITY
        .into_iter()
        .find(|s| counts.get(*s) > 0)
        .unwrap_or(Status::Unknown)
}

// ── StatusPalette ───────────────────────────────────────────────────

/// Colour for each status, as CSS hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPalette {
    pub ok: String,
    pub problem: String,
    pub critical: String,
    pub unknown: String,
    pub deactivated: String,
}

impl Default for StatusPalette {
    fn default() -> Self {
        Self {
            ok: "#267126".into(),
            problem: "#ffb442".into(),
            critical: "#a72d1d".into(),
            unknown: "#353c44".into(),
            deactivated: "#000000".into(),
        }
    }
}

impl StatusPalette {
    pub fn color(&self, status: Status) -> &str {
        match status {
            Status::Ok => &self.ok,
            Status::Problem => &self.problem,
            Status::Critical => &self.critical,
            Status::Unknown => &self.unknown,
            Status::Deactivated => &self.deactivated,
        }
    }

    /// Reverse lookup, case-insensitive. Some feeds send the colour
    /// instead of the status name.
    pub fn status_for_color(&self, color: &str) -> Option<Status> {
        let color = color.trim();
        Status::PRIORITY
            .into_iter()
            .find(|s| self.color(*s).eq_ignore_ascii_case(color))
    }
}
