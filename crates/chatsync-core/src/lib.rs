//! # chatsync-core
//!
//! Core crate for ChatSync. Contains configuration schemas, typed
//! identifiers, the conversation domain model, the closed event enums
//! shared by the real-time engine, collaborator traits, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other ChatSync crates.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod result;
pub mod time;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
