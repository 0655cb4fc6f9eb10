#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub workers: usize,
    pub task_timeout_secs: u64,
    pub max_attempts: i64,
    pub processing_timeout_secs: i64,
    pub sweep_interval_secs: u64,
    pub retention_days: i64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_or("DATABASE_URL", "sqlite://portalq.db?mode=rwc");

        let workers: usize = env_or("PORTALQ_WORKERS", "4")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_WORKERS: {e}"))?;

        let task_timeout_secs: u64 = env_or("PORTALQ_TASK_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_TASK_TIMEOUT_SECS: {e}"))?;

        let max_attempts: i64 = env_or("PORTALQ_MAX_ATTEMPTS", "3")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_MAX_ATTEMPTS: {e}"))?;

        let processing_timeout_secs: i64 = env_or("PORTALQ_PROCESSING_TIMEOUT_SECS", "600")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_PROCESSING_TIMEOUT_SECS: {e}"))?;

        let sweep_interval_secs: u64 = env_or("PORTALQ_SWEEP_INTERVAL_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_SWEEP_INTERVAL_SECS: {e}"))?;
        if sweep_interval_secs == 0 {
            return Err("PORTALQ_SWEEP_INTERVAL_SECS must be at least 1".to_string());
        }

        let retention_days: i64 = env_or("PORTALQ_RETENTION_DAYS", "30")
            .parse()
            .map_err(|e| format!("Invalid PORTALQ_RETENTION_DAYS: {e}"))?;

        let log_level = env_or("PORTALQ_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            workers,
            task_timeout_secs,
            max_attempts,
            processing_timeout_secs,
            sweep_interval_secs,
            retention_days,
            log_level,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
