//! Configuration validation.
//!
//! Checks every config field the service reads before any adapter is built,
//! and resolves defaults into [`ServiceSettings`].

use crate::domain::error::FolioError;
use crate::domain::prediction::{HorizonLimits, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use crate::ports::config_port::ConfigPort;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub backend: Backend,
    pub bind: SocketAddr,
    pub log_filter: String,
    pub horizon: HorizonLimits,
}

pub fn validate_service_config(config: &dyn ConfigPort) -> Result<ServiceSettings, FolioError> {
    let backend = validate_backend(config)?;
    validate_pool_size(config, backend)?;
    let bind = validate_bind(config)?;
    let horizon = validate_prediction(config)?;
    let log_filter = config
        .get_string("logging", "filter")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    Ok(ServiceSettings {
        backend,
        bind,
        log_filter,
        horizon,
    })
}

pub fn validate_backend(config: &dyn ConfigPort) -> Result<Backend, FolioError> {
    let name = config
        .get_string("database", "backend")
        .unwrap_or_else(|| "sqlite".to_string());
    let backend = match name.trim().to_lowercase().as_str() {
        "sqlite" => Backend::Sqlite,
        "postgres" | "postgresql" => Backend::Postgres,
        other => {
            return Err(FolioError::ConfigInvalid {
                section: "database".to_string(),
                key: "backend".to_string(),
                reason: format!("unknown backend '{other}', expected sqlite or postgres"),
            });
        }
    };

    let (section, key) = match backend {
        Backend::Sqlite => ("sqlite", "path"),
        Backend::Postgres => ("postgres", "connection_string"),
    };
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(backend),
        _ => Err(FolioError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort, backend: Backend) -> Result<(), FolioError> {
    let section = match backend {
        Backend::Sqlite => "sqlite",
        Backend::Postgres => "postgres",
    };
    let value = config.get_int(section, "pool_size", 4);
    if !(1..=256).contains(&value) {
        return Err(FolioError::ConfigInvalid {
            section: section.to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be between 1 and 256".to_string(),
        });
    }
    Ok(())
}

fn validate_bind(config: &dyn ConfigPort) -> Result<SocketAddr, FolioError> {
    let raw = config
        .get_string("server", "bind")
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    raw.trim()
        .parse::<SocketAddr>()
        .map_err(|_| FolioError::ConfigInvalid {
            section: "server".to_string(),
            key: "bind".to_string(),
            reason: format!("'{raw}' is not a socket address"),
        })
}

fn validate_prediction(config: &dyn ConfigPort) -> Result<HorizonLimits, FolioError> {
    let max_days = config.get_int("prediction", "max_days", i64::from(MAX_HORIZON_DAYS));
    if !(1..=36_500).contains(&max_days) {
        return Err(FolioError::ConfigInvalid {
            section: "prediction".to_string(),
            key: "max_days".to_string(),
            reason: "max_days must be between 1 and 36500".to_string(),
        });
    }
    let default_days = config.get_int(
        "prediction",
        "default_days",
        i64::from(DEFAULT_HORIZON_DAYS).min(max_days),
    );
    if default_days < 1 || default_days > max_days {
        return Err(FolioError::ConfigInvalid {
            section: "prediction".to_string(),
            key: "default_days".to_string(),
            reason: "default_days must be between 1 and max_days".to_string(),
        });
    }
    Ok(HorizonLimits {
        default_days: default_days as u32,
        max_days: max_days as u32,
    })
}
