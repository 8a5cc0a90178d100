//! Wall-clock budget for one conversion.
//!
//! The async side stops waiting for a blocking job once the request timeout
//! elapses, but the job itself cannot be cancelled. Backends check the
//! [`Deadline`] they are handed before taking the PDFium lock and between
//! pages, so an abandoned job gives up instead of running in full.

use crate::error::ConvertError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    secs: u64,
}

impl Deadline {
    /// Expires `secs` seconds from now.
    pub fn after_secs(secs: u64) -> Self {
        Self {
            at: Instant::now().checked_add(Duration::from_secs(secs)),
            secs,
        }
    }

    /// Never expires.
    pub fn never() -> Self {
        Self { at: None, secs: 0 }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// `Err(Timeout)` once the deadline has passed.
    pub fn check(&self) -> Result<(), ConvertError> {
        if self.is_expired() {
            return Err(ConvertError::Timeout { secs: self.secs });
        }
        Ok(())
    }
}
