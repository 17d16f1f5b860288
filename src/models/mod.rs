//! Core data models for the stats store.

mod export;
mod period;
mod record;

pub use export::*;
pub use period::*;
pub use record::*;
