use std::env;

/// Runtime configuration for storage and background maintenance
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for all stored assets (default: "./storage")
    pub storage_root: String,

    /// Age in hours after which staged temp files are swept (default: 24)
    pub orphan_max_age_hours: u64,

    /// Seconds between orphan sweep runs (default: 3600)
    pub sweep_interval_secs: u64,

    /// Maximum accepted upload body in bytes (default: 20 MB, the largest
    /// category ceiling)
    pub max_upload_bytes: usize,

    /// CORS origins; empty means any origin is allowed (default: empty)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: "./storage".to_string(),
            orphan_max_age_hours: 24,
            sweep_interval_secs: 3600,
            max_upload_bytes: 20 * 1024 * 1024, // 20 MB
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_root: env::var("STORAGE_ROOT").unwrap_or(default.storage_root),

            orphan_max_age_hours: env::var("ORPHAN_MAX_AGE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_max_age_hours),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_bytes),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (local folder, aggressive sweeping)
    pub fn development() -> Self {
        Self {
            storage_root: "./storage-dev".to_string(),
            orphan_max_age_hours: 1,
            sweep_interval_secs: 60,
            max_upload_bytes: 20 * 1024 * 1024,
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage_root, "./storage");
        assert_eq!(config.orphan_max_age_hours, 24);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.orphan_max_age_hours, 1);
        assert_eq!(config.sweep_interval_secs, 60);
    }
}
