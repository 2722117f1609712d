//! Routes parsed records to their handler.
//!
//! The table is built once, explicitly, by [`Dispatcher::standard`]. Dispatch
//! runs on the caller's thread (replay or tail) and takes no locks of its
//! own; the registries a handler touches synchronize themselves.

use flightdeck_journal::{parse_line, EventRecord};
use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers;
use crate::registry::Registries;

pub type Handler = fn(&Registries, &EventRecord);

pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
    fallback: Handler,
    registries: Arc<Registries>,
}

impl Dispatcher {
    /// A dispatcher that knows no events; everything goes to the fallback.
    pub fn empty(registries: Arc<Registries>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: ignore_unknown,
            registries,
        }
    }

    /// The full journal vocabulary.
    pub fn standard(registries: Arc<Registries>) -> Self {
        let mut dispatcher = Self::empty(registries);
        handlers::register_all(&mut dispatcher);
        dispatcher
    }

    /// Registers `handler` for `event`, replacing any previous handler.
    pub fn register(&mut self, event: &'static str, handler: Handler) -> &mut Self {
        self.handlers.insert(event, handler);
        self
    }

    pub fn with_fallback(mut self, fallback: Handler) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn dispatch(&self, record: &EventRecord) {
        let handler = self
            .handlers
            .get(record.event())
            .copied()
            .unwrap_or(self.fallback);
        handler(&self.registries, record);
    }

    /// Parses and dispatches one raw line. Returns false when the line was
    /// malformed and skipped.
    pub fn dispatch_line(&self, line: &str) -> bool {
        match parse_line(line) {
            Ok(record) => {
                self.dispatch(&record);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "Skipping malformed journal line");
                false
            }
        }
    }
}

fn ignore_unknown(_registries: &Registries, record: &EventRecord) {
    tracing::trace!(event = record.event(), "No handler for journal event");
}
