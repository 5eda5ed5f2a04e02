//! Services behind the callback layer: session storage, user resolution,
//! completion signals and the dispatcher tying them together.

pub mod credentials;
pub mod dispatcher;
pub mod session_store;
pub mod signals;
pub mod user_store;
