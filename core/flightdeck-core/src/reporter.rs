//! Seam for the remote usage/version service.
//!
//! The engine tells the reporter when a session starts and ends and which
//! player it resolved. Failures are the reporter's problem: the engine logs
//! them and carries on.

pub trait UsageReporter: Send + Sync {
    fn start_session(&self) -> Result<(), String>;

    fn end_session(&self) -> Result<(), String>;

    fn report_player(&self, player_id: &str) -> Result<(), String>;
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl UsageReporter for NoopReporter {
    fn start_session(&self) -> Result<(), String> {
        Ok(())
    }

    fn end_session(&self) -> Result<(), String> {
        Ok(())
    }

    fn report_player(&self, _player_id: &str) -> Result<(), String> {
        Ok(())
    }
}
