// Copyright (C) Microsoft Corporation. All rights reserved.

//! Test attribute that routes `tracing` output of the test body to the
//! libtest capture buffer.
//!
//! ```ignore
//! use test_with_tracing::test;
//!
//! #[test]
//! fn derives_secret() {
//!     tracing::debug!("visible with --nocapture");
//! }
//! ```

// This is only used by test code; we allow `expect` usage (but not `unwrap`) here.
#![allow(clippy::expect_used)]

#[cfg(test)]
extern crate self as test_with_tracing;

#[doc(hidden)]
pub use tracing;
pub use test_with_tracing_macro::test;
use tracing::metadata::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the filter directives.
const FILTER_ENV: &str = "RUST_LOG";

#[doc(hidden)]
/// Installs the process-wide test subscriber once.
///
/// Filter directives come from `RUST_LOG`; without it every event at
/// `DEBUG` or above is shown.
pub fn init() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let filter = match std::env::var(FILTER_ENV) {
            Ok(directives) => EnvFilter::builder()
                .parse(directives)
                .expect("Failed to parse RUST_LOG environment variable"),
            Err(_) => EnvFilter::default().add_directive(LevelFilter::DEBUG.into()),
        };

        // Another harness may have won the race for the global default.
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .log_internal_errors(true)
            .with_test_writer()
            .with_max_level(LevelFilter::TRACE)
            .with_thread_ids(true)
            .with_target(true)
            .finish()
            .with(filter)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::test;

    #[test]
    fn test_event_inside_span() {
        tracing::info!("event emitted inside the per-test span");
        log::info!("log records are bridged as well");
    }

    #[test]
    fn test_with_return() -> Result<(), Box<dyn std::error::Error>> {
        tracing::debug!(answer = 42, "fallible test body");
        Ok(())
    }
}
