//! Core data models for the upload-callback gateway.
//!
//! Users and storage policies map onto SQLite rows, callback sessions are
//! held in the session store and serialize with `serde` so a distributed
//! cache can carry them.

pub mod policy;
pub mod response;
pub mod session;
pub mod user;
