use std::env;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo { uri: String, database_name: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub frontend_origin: String,
    pub jwt_secret: String,
    pub storage: StorageBackend,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("mongo") => StorageBackend::Mongo {
                uri: lookup("MONGO_URI").ok_or(ConfigError::Missing("MONGO_URI"))?,
                database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "timebox".to_string()),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            frontend_origin: lookup("FRONTEND_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_mongo_storage() {
        let config = config(&[("JWT_SECRET", "s"), ("MONGO_URI", "mongodb://db")]).unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Mongo {
                uri: "mongodb://db".to_string(),
                database_name: "timebox".to_string(),
            }
        );
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.frontend_origin, "http://localhost:3000");
    }

    #[test]
    fn memory_storage_needs_no_mongo_uri() {
        let config = config(&[("JWT_SECRET", "s"), ("STORAGE_BACKEND", "memory")]).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(matches!(
            config(&[("STORAGE_BACKEND", "memory")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("STORAGE_BACKEND", "redis")]),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
