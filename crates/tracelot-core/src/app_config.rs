use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub shipstation_api_key: Option<String>,
    pub shipstation_api_secret: Option<String>,
    pub lot_log_path: PathBuf,
    pub default_rep_id: Option<i64>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub sync_window_days: i64,
    pub sync_max_orders: u32,
    pub sync_throttle_secs: u64,
    pub shipstation_list_timeout_secs: u64,
    pub shipstation_detail_timeout_secs: u64,
    pub shipstation_max_attempts: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "shipstation_api_key",
                &self.shipstation_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "shipstation_api_secret",
                &self.shipstation_api_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("lot_log_path", &self.lot_log_path)
            .field("default_rep_id", &self.default_rep_id)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("sync_window_days", &self.sync_window_days)
            .field("sync_max_orders", &self.sync_max_orders)
            .field("sync_throttle_secs", &self.sync_throttle_secs)
            .field(
                "shipstation_list_timeout_secs",
                &self.shipstation_list_timeout_secs,
            )
            .field(
                "shipstation_detail_timeout_secs",
                &self.shipstation_detail_timeout_secs,
            )
            .field("shipstation_max_attempts", &self.shipstation_max_attempts)
            .finish()
    }
}
