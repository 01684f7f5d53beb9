// src/lib.rs
pub mod config;
pub mod display;
pub mod error;
pub mod scan;
pub mod sequencer;
pub mod types;
pub use config::ScopeConfig;
pub use error::ScopeError;
