//! Insight Core Library
//!
//! This crate provides the foundational utilities shared by every Insight crate:
//! - Error handling (`AppError`, `ErrorKind`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management, including the engine sections each
//!   component receives by value at construction time

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};
