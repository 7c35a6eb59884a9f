//! Error type for the boundary-I/O seam.
//!
//! The sample path, the splitter, and the state machine never return a
//! typed error — back-pressure and hysteresis are part of the steady-state
//! contract, not failures. `CoreError` exists only for the byte-stream
//! endpoint adapters (PTY-style `open`/`reopen`/`write`) that plug into the
//! pipe from outside this crate.

use std::fmt::{Display, Formatter};

/// Boundary I/O failure surfaced by an adapter, never by the sample path.
#[derive(Debug)]
pub enum CoreError {
    Io(std::io::Error),
    NotOpen(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::NotOpen(what) => write!(f, "{} is not open", what),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
