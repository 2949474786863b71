pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod spotify;
pub mod store;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use model::{PlaybackState, PlaybackUpdate};
