//! Upload callback authentication gateway.
//!
//! Storage providers call back after an upload completes. Each callback is
//! bound to a one-time session, resolved to its user, and verified with the
//! scheme of the user's storage policy before anything downstream sees it.

pub mod auth;
pub mod body;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
