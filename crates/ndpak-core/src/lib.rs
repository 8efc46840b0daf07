//! ndpak core library
//!
//! Common math types, the game identifier and the unified error type
//! shared by the parser, exporter and CLI crates.

pub mod error;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use types::*;
