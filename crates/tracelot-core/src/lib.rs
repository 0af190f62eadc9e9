use thiserror::Error;

pub mod app_config;
pub mod canonical;
pub mod classifier;
pub mod config;

pub use app_config::{AppConfig, Environment};
pub use canonical::{canonicalize_sku, normalize_company_key, normalize_lot, LOT_PREFIX};
pub use classifier::{classify_quantity, ClassifierState, ItemMeasure};
pub use config::{load_app_config, load_app_config_from_env};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
