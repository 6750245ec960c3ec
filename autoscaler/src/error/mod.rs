//! Error taxonomy.
//!
//! Mirrors the two-tier split the rest of the source uses for its own
//! failure domains: startup errors are fatal, runtime errors are caught
//! and logged at the cycle boundary.

pub mod init;
pub mod runtime;

pub use init::InitError;
pub use runtime::RuntimeError;
