//! Journal record types and parsing for flightdeck.
//!
//! This crate is shared by the engine and its hosts to prevent schema drift.
//! It knows how one journal line becomes an [`EventRecord`], how journal files
//! are named, and which records declare the player's identity. It knows
//! nothing about what the records mean.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

/// Events that declare which player wrote the journal.
pub const IDENTITY_EVENTS: [&str; 2] = ["Commander", "LoadGame"];

/// Field carrying the stable player id on identity events.
pub const PLAYER_ID_FIELD: &str = "FID";

static RE_JOURNAL_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Journal\.(\d{4}-\d{2}-\d{2})T(\d{6})\.(\d{2,})\.log$").unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line is empty")]
    Empty,

    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("line is not a JSON object")]
    NotAnObject,

    #[error("record has no event discriminator")]
    MissingEvent,

    #[error("record has no timestamp")]
    MissingTimestamp,

    #[error("timestamp is not RFC3339: {0}")]
    InvalidTimestamp(String),
}

/// One parsed journal line.
///
/// `event` and `timestamp` are lifted out of the payload; everything else
/// stays in `fields` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    event: String,
    timestamp: DateTime<Utc>,
    fields: Map<String, Value>,
}

impl EventRecord {
    pub fn new(event: impl Into<String>, timestamp: DateTime<Utc>, fields: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            timestamp,
            fields,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Non-empty string field.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Prefers the `<key>_Localised` variant the game writes next to
    /// symbol names like `$MissionName_Massacre;`.
    pub fn localised(&self, key: &str) -> Option<&str> {
        self.str(&format!("{}_Localised", key))
            .or_else(|| self.str(key))
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.get(key).and_then(Value::as_array)
    }

    pub fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.str(key).and_then(parse_timestamp)
    }
}

/// Parses one journal line.
pub fn parse_line(line: &str) -> Result<EventRecord, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(ParseError::InvalidJson)?;
    let Value::Object(mut fields) = value else {
        return Err(ParseError::NotAnObject);
    };

    let event = match fields.remove("event") {
        Some(Value::String(event)) if !event.trim().is_empty() => event,
        _ => return Err(ParseError::MissingEvent),
    };

    let timestamp = match fields.remove("timestamp") {
        Some(Value::String(raw)) => match parse_timestamp(&raw) {
            Some(timestamp) => timestamp,
            None => return Err(ParseError::InvalidTimestamp(raw)),
        },
        _ => return Err(ParseError::MissingTimestamp),
    };

    Ok(EventRecord {
        event,
        timestamp,
        fields,
    })
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The player declared by an identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub player_id: String,
    pub name: Option<String>,
}

pub fn is_identity_event(event: &str) -> bool {
    IDENTITY_EVENTS.contains(&event)
}

/// Returns the identity declared by `record`, if it is an identity event
/// carrying a player id.
pub fn identity_of(record: &EventRecord) -> Option<PlayerIdentity> {
    if !is_identity_event(record.event()) {
        return None;
    }
    let player_id = record.str(PLAYER_ID_FIELD)?.to_string();
    let name = match record.event() {
        "LoadGame" => record.str("Commander"),
        _ => record.str("Name"),
    };
    Some(PlayerIdentity {
        player_id,
        name: name.map(str::to_string),
    })
}

/// Decoded `Journal.<yyyy-MM-dd>T<HHmmss>.<seq>.log` file name.
///
/// Orders chronologically: start time first, then sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JournalFileName {
    pub started_at: NaiveDateTime,
    pub sequence: u32,
}

impl JournalFileName {
    pub fn parse(name: &str) -> Option<Self> {
        let captures = RE_JOURNAL_FILE.captures(name)?;
        let date = NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(&captures[2], "%H%M%S").ok()?;
        let sequence = captures[3].parse().ok()?;
        Some(Self {
            started_at: date.and_time(time),
            sequence,
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
    }

    pub fn date(&self) -> NaiveDate {
        self.started_at.date()
    }

    pub fn file_name(&self) -> String {
        format!(
            "Journal.{}.{:02}.log",
            self.started_at.format("%Y-%m-%dT%H%M%S"),
            self.sequence
        )
    }
}

pub fn is_journal_file_name(name: &str) -> bool {
    JournalFileName::parse(name).is_some()
}
