pub mod config;
pub mod errors;
pub mod phone;

pub use config::{AppConfig, ConfigOverrides};
pub use errors::AppError;
