use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Defaults applied when a slot listing request leaves horizon fields out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub horizon_start_offset_days: u32,
    pub horizon_days: u32,
    pub max_horizon_days: u32,
    pub default_slot_minutes: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            horizon_start_offset_days: 2,
            horizon_days: 30,
            max_horizon_days: 90,
            default_slot_minutes: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub provider_directory_path: Option<String>,
    pub server_port: u16,
    pub scheduling: SchedulingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            provider_directory_path: None,
            server_port: 3000,
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Missing or
    /// malformed values fall back to defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SchedulingConfig::default();

        let string_var = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                warn!("{} not set, using empty value", key);
                String::new()
            })
        };

        let config = Self {
            supabase_url: string_var("SUPABASE_URL"),
            supabase_anon_key: string_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: string_var("SUPABASE_JWT_SECRET"),
            storage_backend: parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::Memory),
            provider_directory_path: lookup("PROVIDER_DIRECTORY_PATH").filter(|p| !p.is_empty()),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000),
            scheduling: SchedulingConfig {
                horizon_start_offset_days: parse_or(
                    &lookup,
                    "SCHEDULING_HORIZON_START_OFFSET_DAYS",
                    defaults.horizon_start_offset_days,
                ),
                horizon_days: parse_or(&lookup, "SCHEDULING_HORIZON_DAYS", defaults.horizon_days),
                max_horizon_days: parse_or(
                    &lookup,
                    "SCHEDULING_MAX_HORIZON_DAYS",
                    defaults.max_horizon_days,
                ),
                default_slot_minutes: parse_or(
                    &lookup,
                    "SCHEDULING_DEFAULT_SLOT_MINUTES",
                    defaults.default_slot_minutes,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
            && (self.storage_backend == StorageBackend::Memory || self.is_supabase_configured())
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(|_| None);

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.scheduling, SchedulingConfig::default());
        assert!(!config.is_configured());
    }

    #[test]
    fn scheduling_knobs_are_read() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SUPABASE_JWT_SECRET", "secret"),
            ("SCHEDULING_HORIZON_DAYS", "14"),
            ("SCHEDULING_DEFAULT_SLOT_MINUTES", "30"),
            ("STORAGE_BACKEND", "Supabase"),
        ]));

        assert_eq!(config.scheduling.horizon_days, 14);
        assert_eq!(config.scheduling.default_slot_minutes, 30);
        assert_eq!(config.storage_backend, StorageBackend::Supabase);
        // supabase selected but url/key missing
        assert!(!config.is_configured());
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SERVER_PORT", "not-a-port"),
            ("SCHEDULING_MAX_HORIZON_DAYS", "-3"),
        ]));

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.scheduling.max_horizon_days, 90);
    }
}
