//! Config resolution: CLI flag → environment → JSON file → default.

use crate::ingest::{ConfigError, IngestConfig, ValidationPolicy};
use crate::CONFIG_SCHEMA_VERSION;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "GWLOG_S3_ENDPOINT";
pub const ENV_BUCKET_SUFFIX: &str = "BUCKET_NAME_SUFFIX";
pub const ENV_OBJECT_SUFFIX: &str = "GWLOG_OBJECT_SUFFIX";
pub const ENV_STAGING_DIR: &str = "GWLOG_STAGING_DIR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_TABLE: &str = "GWLOG_TABLE";
pub const ENV_MAX_CONNECTIONS: &str = "GWLOG_DB_MAX_CONNECTIONS";
pub const ENV_VALIDATION_POLICY: &str = "GWLOG_VALIDATION_POLICY";

/// Values given explicitly on the command line. These win over everything.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub validation_policy: Option<ValidationPolicy>,
}

/// On-disk config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    schema_version: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
    bucket_suffix: Option<String>,
    object_suffix: Option<String>,
    staging_dir: Option<PathBuf>,
    database_url: Option<String>,
    table_name: Option<String>,
    max_connections: Option<u32>,
    validation_policy: Option<ValidationPolicy>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        if let Some(version) = &file.schema_version {
            if major(version) != major(CONFIG_SCHEMA_VERSION) {
                return Err(ConfigError::UnsupportedVersion {
                    found: version.clone(),
                    supported: CONFIG_SCHEMA_VERSION.to_string(),
                });
            }
        }
        Ok(file)
    }
}

fn major(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|s| s.parse().ok())
}

/// Resolve against the process environment.
pub fn resolve_config(
    file: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<IngestConfig, ConfigError> {
    resolve_config_with(file, overrides, |name| std::env::var(name).ok())
}

/// Resolve with an explicit environment lookup.
pub fn resolve_config_with<F>(
    file: Option<&Path>,
    overrides: &ConfigOverrides,
    env: F,
) -> Result<IngestConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match file {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let env = |name: &str| env(name).filter(|v| !v.is_empty());
    let defaults = IngestConfig::default();

    let max_connections = match env(ENV_MAX_CONNECTIONS) {
        Some(raw) => Some(raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
            field: "max_connections",
            reason: format!("{ENV_MAX_CONNECTIONS}={raw:?} is not a number"),
        })?),
        None => None,
    };

    let validation_policy = match env(ENV_VALIDATION_POLICY) {
        Some(raw) => Some(ValidationPolicy::parse(&raw).ok_or_else(|| {
            ConfigError::Invalid {
                field: "validation_policy",
                reason: format!("{ENV_VALIDATION_POLICY}={raw:?} (expected abort or skip)"),
            }
        })?),
        None => None,
    };

    let config = IngestConfig {
        region: overrides
            .region
            .clone()
            .or_else(|| env(ENV_REGION))
            .or(file.region)
            .unwrap_or(defaults.region),
        endpoint_url: overrides
            .endpoint_url
            .clone()
            .or_else(|| env(ENV_ENDPOINT))
            .or(file.endpoint_url),
        bucket_suffix: env(ENV_BUCKET_SUFFIX)
            .or(file.bucket_suffix)
            .unwrap_or(defaults.bucket_suffix),
        object_suffix: env(ENV_OBJECT_SUFFIX)
            .or(file.object_suffix)
            .unwrap_or(defaults.object_suffix),
        staging_dir: overrides
            .staging_dir
            .clone()
            .or_else(|| env(ENV_STAGING_DIR).map(PathBuf::from))
            .or(file.staging_dir)
            .unwrap_or(defaults.staging_dir),
        database_url: overrides
            .database_url
            .clone()
            .or_else(|| env(ENV_DATABASE_URL))
            .or(file.database_url)
            .unwrap_or(defaults.database_url),
        table_name: env(ENV_TABLE)
            .or(file.table_name)
            .unwrap_or(defaults.table_name),
        max_connections: max_connections
            .or(file.max_connections)
            .unwrap_or(defaults.max_connections),
        validation_policy: overrides
            .validation_policy
            .or(validation_policy)
            .or(file.validation_policy)
            .unwrap_or(defaults.validation_policy),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = resolve_config_with(None, &ConfigOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(config, IngestConfig::default());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = resolve_config_with(
            None,
            &ConfigOverrides::default(),
            env_of(&[
                (ENV_BUCKET_SUFFIX, "apigw-logs"),
                (ENV_DATABASE_URL, "postgresql://db/logs"),
                (ENV_VALIDATION_POLICY, "skip"),
            ]),
        )
        .unwrap();
        assert_eq!(config.bucket_for("stg"), "stg-apigw-logs");
        assert_eq!(config.database_url, "postgresql://db/logs");
        assert_eq!(config.validation_policy, ValidationPolicy::Skip);
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gwlog.json");
        std::fs::write(
            &path,
            r#"{"schema_version": "1.2.0", "region": "us-east-1", "staging_dir": "from-file", "table_name": "apigw_log"}"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            staging_dir: Some(PathBuf::from("from-cli")),
            ..Default::default()
        };
        let config = resolve_config_with(
            Some(&path),
            &overrides,
            env_of(&[(ENV_REGION, "eu-west-1"), (ENV_STAGING_DIR, "from-env")]),
        )
        .unwrap();

        assert_eq!(config.staging_dir, PathBuf::from("from-cli"));
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.table_name, "apigw_log");
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let config = resolve_config_with(
            None,
            &ConfigOverrides::default(),
            env_of(&[(ENV_REGION, "")]),
        )
        .unwrap();
        assert_eq!(config.region, "ap-northeast-1");
    }

    #[test]
    fn test_bad_env_number_is_error() {
        let err = resolve_config_with(
            None,
            &ConfigOverrides::default(),
            env_of(&[(ENV_MAX_CONNECTIONS, "many")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_connections",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_file_field_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gwlog.json");
        std::fs::write(&path, r#"{"bucket": "prod-logs"}"#).unwrap();
        let err =
            resolve_config_with(Some(&path), &ConfigOverrides::default(), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_incompatible_file_version_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gwlog.json");
        std::fs::write(&path, r#"{"schema_version": "2.0.0"}"#).unwrap();
        let err =
            resolve_config_with(Some(&path), &ConfigOverrides::default(), env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));
    }
}
