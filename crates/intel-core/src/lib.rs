pub mod config;
pub mod embedding;
pub mod error;
pub mod types;

pub use config::Settings;
pub use embedding::EmbeddingClient;
pub use error::{IntelError, IntelResult, ProviderError};
pub use types::*;
