//! Collaborator traits the synchronization core depends on.
//!
//! The authentication subsystem lives outside this workspace; these traits
//! are the whole contract with it.

pub mod identity;
pub mod token;

pub use identity::{Identity, IdentityProvider, SessionIdentity};
pub use token::TokenProvider;
