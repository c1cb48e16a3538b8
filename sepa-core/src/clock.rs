//! Time and run-id sources
//!
//! The builder's only non-pure inputs. Tests pin both to get byte-identical
//! documents.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of the creation timestamp
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Freeze at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Source of the disambiguating suffix that makes message ids unique
pub trait IdSource: Send + Sync {
    /// Next suffix: 1-8 uppercase alphanumerics
    fn next_suffix(&self) -> String;
}

/// Random suffix from a v4 UUID
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn next_suffix(&self) -> String {
        Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase()
    }
}

/// Always the same suffix
#[derive(Debug, Clone)]
pub struct FixedIdSource(String);

impl FixedIdSource {
    /// Use `suffix` for every run
    pub fn new(suffix: impl Into<String>) -> Self {
        Self(suffix.into())
    }
}

impl IdSource for FixedIdSource {
    fn next_suffix(&self) -> String {
        self.0.clone()
    }
}
