//! Shared building blocks for Tessera.
//!
//! This crate holds the pieces that both the repository and the messaging
//! layers depend on:
//! - a [`Properties`] bag with subset extraction and credential resolution
//! - the well-known configuration [`keys`]
//! - [`StrategyBindings`], the precedence table used by every strategy resolver
//!
//! Nothing in here performs I/O except reading credential files on request.

mod error;
pub mod keys;
mod properties;
mod strategy;

pub use error::{ConfigError, ConfigResult};
pub use properties::Properties;
pub use strategy::{Strategy, StrategyBindings};
