//! Mining sessions.
//!
//! ```text
//! NoSession ──start──► Active ◄──resume── Suspended
//!                        │  └───suspend───►   │
//!                        └──────end───────────┴──► Ended (retained | discarded)
//! ```
//!
//! At most one session is current. Suspension periods are chronological and
//! never overlap; a completed period always has `resumed_at > suspended_at`.
//! A session that refined nothing is dropped when it ends.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::bus::{ChangeBus, RegistryChange};
use super::{read, write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiningLocation {
    pub system: Option<String>,
    pub body: String,
    pub ring: String,
}

impl MiningLocation {
    /// Builds a location from a ring name such as `"Hyades Sector 1 A Ring"`,
    /// whose parent body is `"Hyades Sector 1"`.
    pub fn at_ring(system: Option<&str>, ring: &str) -> Self {
        let parts: Vec<&str> = ring.split_whitespace().collect();
        let body = match parts.as_slice() {
            [head @ .., letter, "Ring"] if !head.is_empty() && letter.len() == 1 => head.join(" "),
            _ => ring.to_string(),
        };
        Self {
            system: system.map(str::to_string),
            body,
            ring: ring.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspensionPeriod {
    pub suspended_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

impl SuspensionPeriod {
    pub fn duration(&self) -> Option<Duration> {
        self.resumed_at
            .map(|resumed_at| resumed_at - self.suspended_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinedEvent {
    pub mineral: String,
    pub refined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Active,
    Suspended,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Retained,
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiningSession {
    pub id: u64,
    pub location: MiningLocation,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub refined: Vec<RefinedEvent>,
    pub prospected: u32,
    pub suspensions: Vec<SuspensionPeriod>,
}

impl MiningSession {
    fn new(id: u64, location: MiningLocation, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            location,
            started_at,
            ended_at: None,
            refined: Vec::new(),
            prospected: 0,
            suspensions: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.ended_at.is_some() {
            SessionPhase::Ended
        } else if self.open_suspension().is_some() {
            SessionPhase::Suspended
        } else {
            SessionPhase::Active
        }
    }

    /// Total of completed suspension periods.
    pub fn suspended_time(&self) -> Duration {
        self.suspensions
            .iter()
            .filter_map(SuspensionPeriod::duration)
            .fold(Duration::zero(), |total, period| total + period)
    }

    /// Wall-clock span minus completed suspensions. A suspended session's
    /// clock stops at its open suspension.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self
            .ended_at
            .or_else(|| self.open_suspension().map(|period| period.suspended_at))
            .unwrap_or(now);
        let span = end - self.started_at - self.suspended_time();
        span.max(Duration::zero())
    }

    pub fn refined_by_mineral(&self) -> BTreeMap<String, u32> {
        let mut totals = BTreeMap::new();
        for event in &self.refined {
            *totals.entry(event.mineral.clone()).or_insert(0) += 1;
        }
        totals
    }

    pub fn refined_per_hour(&self, now: DateTime<Utc>) -> f64 {
        let seconds = self.duration(now).num_seconds();
        if seconds <= 0 {
            return 0.0;
        }
        self.refined.len() as f64 * 3600.0 / seconds as f64
    }

    fn open_suspension(&self) -> Option<&SuspensionPeriod> {
        self.suspensions
            .last()
            .filter(|period| period.resumed_at.is_none())
    }

    /// Earliest instant a new suspension may start without overlapping.
    fn last_activity_floor(&self) -> DateTime<Utc> {
        self.suspensions
            .last()
            .and_then(|period| period.resumed_at)
            .unwrap_or(self.started_at)
    }

    fn suspend(&mut self, at: DateTime<Utc>) -> bool {
        if self.phase() != SessionPhase::Active || at < self.last_activity_floor() {
            return false;
        }
        self.suspensions.push(SuspensionPeriod {
            suspended_at: at,
            resumed_at: None,
        });
        true
    }

    fn resume(&mut self, at: DateTime<Utc>) -> bool {
        let Some(period) = self.suspensions.last_mut() else {
            return false;
        };
        if period.resumed_at.is_some() {
            return false;
        }
        if at <= period.suspended_at {
            tracing::warn!(
                session_id = self.id,
                suspended_at = %period.suspended_at,
                resumed_at = %at,
                "Dropping suspension period that does not move forward in time"
            );
            self.suspensions.pop();
            return true;
        }
        period.resumed_at = Some(at);
        true
    }
}

#[derive(Default)]
struct MiningState {
    current: Option<MiningSession>,
    history: Vec<MiningSession>,
    next_id: u64,
}

impl MiningState {
    fn finish_current(&mut self, at: DateTime<Utc>) -> Option<SessionEnd> {
        let mut session = self.current.take()?;
        // Ending while suspended: the suspension lasted until now.
        if session.phase() == SessionPhase::Suspended {
            session.resume(at);
        }
        session.ended_at = Some(at.max(session.last_activity_floor()));

        if session.refined.is_empty() {
            tracing::debug!(session_id = session.id, "Discarding mining session with no refined ore");
            Some(SessionEnd::Discarded)
        } else {
            self.history.push(session);
            Some(SessionEnd::Retained)
        }
    }

    /// Current session, resumed first if it was suspended.
    fn working_session(&mut self, at: DateTime<Utc>) -> Option<&mut MiningSession> {
        let session = self.current.as_mut()?;
        if session.phase() == SessionPhase::Suspended {
            session.resume(at);
        }
        Some(session)
    }
}

pub struct MiningRegistry {
    state: RwLock<MiningState>,
    bus: Arc<ChangeBus>,
}

impl MiningRegistry {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            state: RwLock::new(MiningState::default()),
            bus,
        }
    }

    /// Begins mining at `location`. Arriving back at the current session's
    /// ring continues that session; anywhere else ends it first.
    pub fn start(&self, location: MiningLocation, at: DateTime<Utc>) -> u64 {
        let id = {
            let mut state = write(&self.state);
            let continuing = state
                .current
                .as_ref()
                .is_some_and(|current| current.location.ring == location.ring);

            if continuing {
                match state.working_session(at) {
                    Some(session) => session.id,
                    None => 0,
                }
            } else {
                state.finish_current(at);
                state.next_id += 1;
                let id = state.next_id;
                state.current = Some(MiningSession::new(id, location, at));
                id
            }
        };
        self.bus.publish(RegistryChange::Mining);
        id
    }

    pub fn suspend(&self, at: DateTime<Utc>) -> bool {
        let suspended = write(&self.state)
            .current
            .as_mut()
            .is_some_and(|session| session.suspend(at));
        if suspended {
            self.bus.publish(RegistryChange::Mining);
        }
        suspended
    }

    pub fn resume(&self, at: DateTime<Utc>) -> bool {
        let resumed = {
            let mut state = write(&self.state);
            match state.current.as_mut() {
                Some(session) if session.phase() == SessionPhase::Suspended => session.resume(at),
                _ => false,
            }
        };
        if resumed {
            self.bus.publish(RegistryChange::Mining);
        }
        resumed
    }

    pub fn end(&self, at: DateTime<Utc>) -> Option<SessionEnd> {
        let ended = write(&self.state).finish_current(at);
        if ended.is_some() {
            self.bus.publish(RegistryChange::Mining);
        }
        ended
    }

    pub fn record_refined(&self, mineral: &str, at: DateTime<Utc>) -> bool {
        let recorded = {
            let mut state = write(&self.state);
            match state.working_session(at) {
                Some(session) => {
                    session.refined.push(RefinedEvent {
                        mineral: mineral.to_string(),
                        refined_at: at,
                    });
                    true
                }
                None => false,
            }
        };
        if recorded {
            self.bus.publish(RegistryChange::Mining);
        }
        recorded
    }

    pub fn record_prospected(&self, at: DateTime<Utc>) -> bool {
        let recorded = {
            let mut state = write(&self.state);
            match state.working_session(at) {
                Some(session) => {
                    session.prospected += 1;
                    true
                }
                None => false,
            }
        };
        if recorded {
            self.bus.publish(RegistryChange::Mining);
        }
        recorded
    }

    pub fn current(&self) -> Option<MiningSession> {
        read(&self.state).current.clone()
    }

    /// Ended sessions that refined something, oldest first.
    pub fn history(&self) -> Vec<MiningSession> {
        read(&self.state).history.clone()
    }

    pub fn clear(&self) {
        *write(&self.state) = MiningState::default();
        self.bus.publish(RegistryChange::Mining);
    }
}
