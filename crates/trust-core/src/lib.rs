//! Shared data model, error taxonomy, and collaborator contracts for the
//! TrustScope prediction-reliability workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
