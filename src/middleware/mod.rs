//! Request guards for callback and signed first-party endpoints.

pub mod callback;
pub mod sign;
