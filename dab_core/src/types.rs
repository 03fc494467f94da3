//! Core domain types for the Dab Timer.
//!
//! This module defines the fundamental types used throughout the system:
//! - Session settings chosen in the form
//! - Countdown phases
//! - Completed session records and their ratings

use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Lowest accepted flame intensity multiplier
pub const MIN_INTENSITY: f64 = 0.5;

/// Highest accepted flame intensity multiplier
pub const MAX_INTENSITY: f64 = 2.0;

/// Timestamp layout used in the session log (ISO-8601, local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// ============================================================================
// Settings
// ============================================================================

/// The four values picked before a run
///
/// Category fields hold display names (`"Terp Slurper"`, `"Live Resin"`) and
/// are only checked against the configured tables when durations are computed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    pub material: String,
    pub style: String,
    pub wax: String,
    pub intensity: f64,
}

impl SessionSettings {
    pub fn new(
        material: impl Into<String>,
        style: impl Into<String>,
        wax: impl Into<String>,
        intensity: f64,
    ) -> Self {
        Self {
            material: material.into(),
            style: style.into(),
            wax: wax.into(),
            intensity,
        }
    }

    /// Check the intensity against the slider range
    ///
    /// The timer itself never clamps; callers run this before `start`.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&self.intensity) {
            return Err(Error::InvalidIntensity(self.intensity));
        }
        Ok(())
    }
}

impl From<&SessionRecord> for SessionSettings {
    fn from(record: &SessionRecord) -> Self {
        Self {
            material: record.material.clone(),
            style: record.style.clone(),
            wax: record.wax.clone(),
            intensity: record.intensity,
        }
    }
}

// ============================================================================
// Countdown Phase
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Heating,
    Cooling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "Idle",
            Phase::Heating => "Heating",
            Phase::Cooling => "Cooling",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Session Records
// ============================================================================

/// User rating of a finished session, 1 through 5
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Rating(value))
        } else {
            Err(Error::InvalidRating(value.to_string()))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidRating(s.to_string()))?;
        Rating::try_from(value)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One completed session, as stored in the log
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub timestamp: NaiveDateTime,
    pub material: String,
    pub style: String,
    pub wax: String,
    /// Always held at one decimal place, matching the stored text
    pub intensity: f64,
    pub heat_seconds: u32,
    pub cool_seconds: u32,
    pub rating: Option<Rating>,
}

impl SessionRecord {
    /// Build an unrated record for a session that just finished
    ///
    /// The timestamp is cut to microseconds, the precision the log stores.
    pub fn completed(
        settings: &SessionSettings,
        heat_seconds: u32,
        cool_seconds: u32,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(6),
            material: settings.material.clone(),
            style: settings.style.clone(),
            wax: settings.wax.clone(),
            intensity: round_intensity(settings.intensity),
            heat_seconds,
            cool_seconds,
            rating: None,
        }
    }

    /// Human-facing summary used by the log listing
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {}, Intensity: {:.1}x, {}s, {}s",
            self.material,
            self.style,
            self.wax,
            self.intensity,
            self.heat_seconds,
            self.cool_seconds
        )
    }
}

/// Round an intensity to the single decimal the log keeps
///
/// Goes through `{:.1}` so the in-memory value always equals what the CSV
/// row will hold once written and read back.
fn round_intensity(intensity: f64) -> f64 {
    format!("{:.1}", intensity).parse().unwrap_or(intensity)
}
