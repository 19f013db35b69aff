//! Scan engine capability and its adapters.
//!
//! ## Available Engines
//!
//! - [`mock`] - EICAR-detecting engine for tests and demos
//! - `clamav` - ClamAV daemon via `zINSTREAM` (requires `clamav` feature)
//!
//! To plug in another engine, implement [`ScanEngine`].

pub mod mock;
mod traits;

#[cfg(feature = "clamav")]
pub mod clamav;

pub use mock::MockEngine;
pub use traits::{ArcScanEngine, ScanEngine};

#[cfg(feature = "clamav")]
pub use clamav::{ClamAvConfig, ClamAvEngine};
