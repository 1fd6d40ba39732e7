//! neic-locator: iterative seismic event locator.
//!
//! Refines a hypocenter (origin time, latitude, longitude, depth) against a
//! set of phase picks via robust rank-sum descent, re-identifying phases as
//! the solution moves. `core::engine::Engine::locate` is the entry point;
//! `io` carries the JSON and legacy hydra wire formats around it.
//!
//! # Architecture
//!
//! - **core**: pure domain logic (hypocenter, picks, estimators, stepper,
//!   location loop), no I/O
//! - **io**: wire formats (JSON request/response, hydra text)
//! - **logging**: `simplelog` initialization
//! - **server** (feature `service`): `axum` HTTP controller
//! - **bin/locator.rs** / **bin/locator_service.rs**: CLI wrappers

pub mod core;
pub mod io;
pub mod logging;

#[cfg(feature = "service")]
pub mod server;

pub use crate::core::engine::Engine;
pub use crate::core::error::{EngineError, ExitCode, Result};
pub use crate::core::event::Event;

/// Crate version, as reported by `locator --version`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_cargo_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
