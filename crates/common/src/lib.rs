use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for `ttl_seconds` (one year).
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// A granted lease on one resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub resource_id: String,
    pub owner_id: String,
    #[serde(with = "rfc3339_ms")]
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl LeaseRecord {
    /// Instant at which the lease stops being live.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| self.acquired_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A lease is live strictly before `acquired_at + ttl_seconds`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

// Request bodies default missing fields so the coordinator can answer
// INVALID_INPUT with a field-specific message instead of a parse error.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquireRequest {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenewRequest {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectRequest {
    #[serde(default)]
    pub resource_id: String,
}

/// Structured result of every lock operation, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockResponse {
    /// Returned by a granted acquire (no `owner_id`) and by inspect of a live lease.
    Locked {
        resource_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_id: Option<String>,
        #[serde(with = "rfc3339_ms")]
        acquired_at: DateTime<Utc>,
        ttl_seconds: u64,
    },
    Conflict {
        resource_id: String,
        owner_id: String,
        #[serde(with = "rfc3339_ms")]
        acquired_at: DateTime<Utc>,
    },
    Renewed {
        resource_id: String,
        #[serde(with = "rfc3339_ms")]
        acquired_at: DateTime<Utc>,
        ttl_seconds: u64,
    },
    Released {
        resource_id: String,
    },
    Forbidden {
        resource_id: String,
    },
    NotFound {
        resource_id: String,
    },
    Free {
        resource_id: String,
    },
}

/// Body returned for rejected requests, e.g. `{"error":"INVALID_INPUT",...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeResponse {
    #[serde(with = "rfc3339_ms")]
    pub server_time_utc: DateTime<Utc>,
    pub server_unix_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub live_leases: usize,
}

/// RFC3339 timestamps with millisecond precision and a `Z` suffix.
pub mod rfc3339_ms {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
