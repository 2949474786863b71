// Module: http
// HTTP routes: authorization flow and the WebSocket viewer endpoint

pub mod auth;
pub mod error;
pub mod websocket;

pub use error::{AppError, AppResult};
