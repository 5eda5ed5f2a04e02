pub mod callback_handlers;
pub mod health_handlers;
pub mod slave_handlers;
