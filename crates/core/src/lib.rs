pub mod config;
pub mod envelope;
pub mod error;

pub use config::Config;
pub use envelope::Envelope;
pub use error::{Error, Result};
