//! Shared domain types for the Flaschen Taschen display pipeline.

pub mod config;
pub mod events;
pub mod frame;
pub mod raster;

mod errors;

pub use errors::{FlaschenError, Result};
