//! Domain rows persisted by the storage backends
//!
//! ## Tables
//!
//! - `targets` - watched endpoints with their live status
//! - `probe_history` - append-only log of probe outcomes
//! - `admins` - identities allowed to manage targets and receive alerts
//!
//! History rows reference targets by id only. Removing a target leaves its
//! history behind as an orphaned ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Interval used when a stored target carries no usable interval
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Stable identifier of a target, assigned by the store on insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat/user identity shared by target owners and admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub i64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Identity)
    }
}

/// Live status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetStatus {
    /// Never probed
    #[default]
    Unknown,
    Online,
    Offline,
}

impl TargetStatus {
    /// Status implied by a probe outcome
    pub fn from_outcome(success: bool) -> Self {
        if success {
            TargetStatus::Online
        } else {
            TargetStatus::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Unknown => "Unknown",
            TargetStatus::Online => "Online",
            TargetStatus::Offline => "Offline",
        }
    }

    /// Parse a stored status; anything unrecognised maps to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "Online" => TargetStatus::Online,
            "Offline" => TargetStatus::Offline,
            _ => TargetStatus::Unknown,
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watched endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,

    /// Display name, unique within the store
    pub name: String,

    /// HTTP(S) address that gets probed
    pub address: String,

    /// Probe interval in minutes (always >= 1)
    pub interval_minutes: u32,

    pub status: TargetStatus,

    /// Time of the last completed probe (creation time until the first probe)
    pub last_probed: DateTime<Utc>,

    /// Identity notified when the target goes offline
    pub owner: Identity,

    pub created_at: DateTime<Utc>,
}

impl Target {
    /// Elapsed time since the last probe
    pub fn elapsed_since_probe(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_probed
    }

    /// Whether the target should be probed at `now`
    ///
    /// A target is due iff `now - last_probed >= interval`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_since_probe(now) >= Duration::minutes(i64::from(self.interval_minutes))
    }
}

/// Reasons a new target is rejected before it reaches the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetValidationError {
    EmptyName,
    InvalidInterval(i64),
    InvalidAddress(String),
    UnsupportedScheme(String),
}

impl fmt::Display for TargetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetValidationError::EmptyName => write!(f, "target name must not be empty"),
            TargetValidationError::InvalidInterval(interval) => {
                write!(f, "interval must be a positive number of minutes, got {interval}")
            }
            TargetValidationError::InvalidAddress(address) => {
                write!(f, "'{address}' is not a valid URL")
            }
            TargetValidationError::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme '{scheme}', expected http or https")
            }
        }
    }
}

impl std::error::Error for TargetValidationError {}

/// A validated target that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTarget {
    pub name: String,
    pub address: String,
    pub interval_minutes: u32,
    pub owner: Identity,
}

impl NewTarget {
    /// Validate and normalise operator input
    ///
    /// A single leading `@` is stripped from the name. The address must parse
    /// as a URL with an `http` or `https` scheme.
    pub fn new(
        name: &str,
        address: &str,
        interval_minutes: i64,
        owner: Identity,
    ) -> Result<Self, TargetValidationError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(TargetValidationError::EmptyName);
        }

        let interval = u32::try_from(interval_minutes)
            .ok()
            .filter(|interval| *interval >= 1)
            .ok_or(TargetValidationError::InvalidInterval(interval_minutes))?;

        let url = reqwest::Url::parse(address)
            .map_err(|_| TargetValidationError::InvalidAddress(address.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TargetValidationError::UnsupportedScheme(
                url.scheme().to_string(),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            interval_minutes: interval,
            owner,
        })
    }

    /// Build the stored target once the store has assigned an id
    pub fn into_target(self, id: TargetId, created_at: DateTime<Utc>) -> Target {
        Target {
            id,
            name: self.name,
            address: self.address,
            interval_minutes: self.interval_minutes,
            status: TargetStatus::Unknown,
            last_probed: created_at,
            owner: self.owner,
            created_at,
        }
    }
}

/// Strip surrounding whitespace and a single leading `@`
pub fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix('@').unwrap_or(name)
}

/// One probe outcome in the append-only history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub target_id: TargetId,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// An identity authorized to run commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub identity: Identity,
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Uptime statistics for a target
///
/// Uptime % = (successful probes / total probes) × 100, and 0.0 without history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UptimeStats {
    pub total: u64,
    pub successful: u64,
    pub percentage: f64,
}

impl UptimeStats {
    pub fn new(successful: u64, total: u64) -> Self {
        let successful = successful.min(total);
        Self {
            total,
            successful,
            percentage: uptime_percentage(successful, total),
        }
    }
}

pub fn uptime_percentage(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (successful.min(total) as f64 / total as f64) * 100.0
}
