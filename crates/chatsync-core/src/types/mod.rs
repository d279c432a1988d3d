//! Core type definitions used across the ChatSync workspace.

pub mod id;

pub use id::*;
