pub mod commands;
pub mod handlers;

pub use commands::{Commands, LoggingConfig};
pub use handlers::{handle_check, handle_query, handle_route};
