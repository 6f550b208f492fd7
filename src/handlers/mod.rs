pub mod admin_gate;
pub mod admin_handlers;
pub mod extract;
pub mod health_handlers;
pub mod photo_handlers;
