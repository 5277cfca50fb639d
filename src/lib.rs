pub mod config;
pub mod core;
pub mod credential;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use crate::config::ServerConfig;
pub use crate::core::session::errors::{SessionError, SessionResult};
pub use crate::core::session::{SessionConfig, VoiceSession};
pub use crate::errors::app_error::{AppError, AppResult};
pub use crate::state::AppState;
