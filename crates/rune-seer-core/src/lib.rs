//! Core library for rune-seer.
//!
//! This crate provides the UTF-8 decomposition engine, the batch analyzer and
//! the per-client rate limiter used by the `rune-seer` CLI and web service.
//!
//! # Modules
//!
//! - [`decompose`] - Code point ⇄ annotated byte records
//! - [`batch`] - Whole-input analysis and single-character lookups
//! - [`ratelimit`] - Token-bucket limiter keyed by client identity
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```
//! use rune_seer_core::analyze;
//!
//! let reports = analyze("a😊");
//! assert_eq!(reports[1].notation, "U+1F60A");
//! assert_eq!(reports[1].bytes.len(), 4);
//! assert_eq!(reports[1].bytes[0].global_byte_index, 1);
//! ```
#![deny(unsafe_code)]

pub mod batch;
pub mod config;
pub mod decompose;
pub mod error;
pub mod ratelimit;

pub use batch::{CharacterReport, DetailReport, analyze, analyze_bytes, detail};
pub use config::{Config, ConfigLoader, DEFAULT_MAX_INPUT_BYTES, LogLevel, RateLimitConfig};
pub use decompose::{ByteRecord, Utf8Mask, decompose, reconstruct};
pub use error::{ConfigError, ConfigResult, EncodingError, EncodingResult};
pub use ratelimit::{Decision, RateLimiter};
