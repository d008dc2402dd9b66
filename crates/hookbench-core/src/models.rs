//! Log record model and strongly-typed identifiers.
//!
//! A `LogRecord` is written for every callback the service accepts. The
//! store assigns its `LogId`; callers never choose one.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Store-assigned identifier of a log record.
///
/// Identifiers are monotonic and never reused, even after the log is
/// cleared.
///
/// # Example
///
/// ```
/// use hookbench_core::models::LogId;
/// let id = LogId::from(7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub i64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LogId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// HTTP method of a logged callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackMethod {
    /// A GET callback; carries no body.
    #[serde(rename = "GET")]
    Get,
    /// A POST callback with a decoded body.
    #[serde(rename = "POST")]
    Post,
}

impl CallbackMethod {
    /// Returns the wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for CallbackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(CoreError::InvalidInput(format!("unknown callback method: {other}"))),
        }
    }
}

/// One received callback.
///
/// `body` holds the decoded form data as JSON text for POST callbacks and
/// is `None` for GET. After insertion it may gain a single forwarding
/// outcome line; nothing else about a record ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Store-assigned identifier
    pub id: LogId,
    /// Method of the callback
    pub method: CallbackMethod,
    /// Time the record was inserted
    pub time: DateTime<Utc>,
    /// Decoded body text, if any
    pub body: Option<String>,
}

impl LogRecord {
    /// Orders records newest first, breaking timestamp ties by id.
    pub fn newest_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.time.cmp(&a.time).then_with(|| b.id.cmp(&a.id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(id: i64, secs: i64) -> LogRecord {
        LogRecord {
            id: LogId(id),
            method: CallbackMethod::Get,
            time: Utc.timestamp_opt(secs, 0).single().unwrap(),
            body: None,
        }
    }

    #[test]
    fn method_round_trips_through_str() {
        assert_eq!("GET".parse::<CallbackMethod>().unwrap(), CallbackMethod::Get);
        assert_eq!("POST".parse::<CallbackMethod>().unwrap(), CallbackMethod::Post);
        assert!("PUT".parse::<CallbackMethod>().is_err());
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let mut rec = record(3, 1_700_000_000);
        rec.method = CallbackMethod::Post;
        rec.body = Some("{\"a\":[\"1\"]}".to_string());

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "POST");
        assert_eq!(json["body"], "{\"a\":[\"1\"]}");
        assert!(json["time"].as_str().unwrap().starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn get_record_serializes_null_body() {
        let json = serde_json::to_value(record(1, 0)).unwrap();
        assert!(json["body"].is_null());
    }

    #[test]
    fn newest_first_orders_by_time_then_id() {
        let mut records = vec![record(1, 10), record(2, 30), record(3, 30), record(4, 20)];
        records.sort_by(LogRecord::newest_first);

        let ids: Vec<i64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }
}
