//! Configuration Management
//!
//! Merges command line options with an optional JSON config file. Command
//! line values always win; the file only fills in what was not given.

use crate::azure::http::{InvalidProxy, ProxySetting};
use crate::azure::Endpoints;
use crate::inventory::query::UnknownService;
use crate::inventory::{QueryScope, ServiceSelector};
use crate::secret::{default_password_store, SecretSource};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const MIN_TIMEOUT_SECS: u64 = 3;
pub const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option --{0}")]
    Missing(&'static str),

    #[error("{field} must be in 36-character GUID format, got '{value}'")]
    InvalidGuid { field: &'static str, value: String },

    #[error("the timeout must be between 3s and 600s, got {0}s")]
    InvalidTimeout(u64),

    #[error(transparent)]
    UnknownService(#[from] UnknownService),

    #[error(transparent)]
    InvalidProxy(#[from] InvalidProxy),

    #[error("invalid {field} URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("filter by subscriptions and by management groups are mutually exclusive")]
    ConflictingFilters,

    #[error("--app-secret-id needs --password-store or OMD_ROOT to locate the password store")]
    NoPasswordStore,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Options as given on the command line or in the config file
///
/// Every field is optional so the two sources can be layered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tenant_id: Option<String>,
    pub app_id: Option<String>,
    /// Only accepted on the command line
    #[serde(skip)]
    pub app_secret: Option<SecretString>,
    pub app_secret_env: Option<String>,
    pub app_secret_id: Option<String>,
    pub password_store: Option<PathBuf>,
    pub services_to_monitor: Option<Vec<String>>,
    pub filter_subscriptions: Option<Vec<String>>,
    pub filter_management_groups: Option<Vec<String>>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub authority_host: Option<String>,
    pub management_host: Option<String>,
}

impl Settings {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ms-azure-addon").join("config.json"))
    }

    /// Load settings from a config file.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Loaded config file {:?}", path);

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: Settings) -> Settings {
        let has_secret = self.app_secret.is_some()
            || self.app_secret_env.is_some()
            || self.app_secret_id.is_some();
        let has_filter =
            self.filter_subscriptions.is_some() || self.filter_management_groups.is_some();

        let (app_secret_env, app_secret_id) = if has_secret {
            (self.app_secret_env, self.app_secret_id)
        } else {
            (fallback.app_secret_env, fallback.app_secret_id)
        };
        let (filter_subscriptions, filter_management_groups) = if has_filter {
            (self.filter_subscriptions, self.filter_management_groups)
        } else {
            (fallback.filter_subscriptions, fallback.filter_management_groups)
        };

        Settings {
            tenant_id: self.tenant_id.or(fallback.tenant_id),
            app_id: self.app_id.or(fallback.app_id),
            app_secret: self.app_secret,
            app_secret_env,
            app_secret_id,
            password_store: self.password_store.or(fallback.password_store),
            services_to_monitor: self.services_to_monitor.or(fallback.services_to_monitor),
            filter_subscriptions,
            filter_management_groups,
            timeout: self.timeout.or(fallback.timeout),
            proxy: self.proxy.or(fallback.proxy),
            authority_host: self.authority_host.or(fallback.authority_host),
            management_host: self.management_host.or(fallback.management_host),
        }
    }
}

/// Validated configuration for one agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub tenant_id: String,
    pub app_id: String,
    pub secret: SecretSource,
    pub services: ServiceSelector,
    pub scope: QueryScope,
    pub timeout: Duration,
    pub proxy: ProxySetting,
    pub endpoints: Endpoints,
}

impl AgentConfig {
    /// Validate layered settings into a run configuration
    pub fn resolve(settings: Settings) -> Result<Self, ConfigError> {
        let tenant_id = required_guid("tenant-id", settings.tenant_id)?;
        let app_id = required_guid("app-id", settings.app_id)?;

        let secret = match (
            settings.app_secret,
            settings.app_secret_env,
            settings.app_secret_id,
        ) {
            (Some(secret), _, _) => SecretSource::Literal(secret),
            (None, Some(var), _) => SecretSource::Env(var),
            (None, None, Some(id)) => {
                let store = settings
                    .password_store
                    .or_else(default_password_store)
                    .ok_or(ConfigError::NoPasswordStore)?;
                SecretSource::Stored { id, store }
            }
            (None, None, None) => return Err(ConfigError::Missing("app-secret")),
        };

        let services =
            ServiceSelector::from_names(settings.services_to_monitor.unwrap_or_default())?;

        let scope = match (
            non_empty(settings.filter_subscriptions),
            non_empty(settings.filter_management_groups),
        ) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingFilters),
            (Some(ids), None) => QueryScope::Subscriptions(ids),
            (None, Some(ids)) => QueryScope::ManagementGroups(ids),
            (None, None) => QueryScope::Tenant,
        };

        let timeout = settings.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout) {
            return Err(ConfigError::InvalidTimeout(timeout));
        }

        let proxy = match settings.proxy {
            Some(proxy) => proxy.parse::<ProxySetting>()?,
            None => ProxySetting::default(),
        };

        let endpoints = resolve_endpoints(settings.authority_host, settings.management_host)?;

        Ok(Self {
            tenant_id,
            app_id,
            secret,
            services,
            scope,
            timeout: Duration::from_secs(timeout),
            proxy,
            endpoints,
        })
    }
}

fn resolve_endpoints(
    authority: Option<String>,
    management: Option<String>,
) -> Result<Endpoints, ConfigError> {
    if authority.is_none() && management.is_none() {
        return Ok(Endpoints::default());
    }

    let authority = authority.unwrap_or_else(|| crate::azure::DEFAULT_AUTHORITY_HOST.to_string());
    let management =
        management.unwrap_or_else(|| crate::azure::DEFAULT_MANAGEMENT_HOST.to_string());

    Endpoints::new(&authority, &management).map_err(|source| ConfigError::InvalidUrl {
        field: "endpoint",
        source,
    })
}

/// Drop blank entries; an all-blank list counts as unset
fn non_empty(values: Option<Vec<String>>) -> Option<Vec<String>> {
    let values: Vec<String> = values?
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();
    (!values.is_empty()).then_some(values)
}

fn required_guid(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(field))?;
    if is_guid(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidGuid { field, value })
    }
}

/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` with hex digits
fn is_guid(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Service;
    use std::io::Write;

    const TENANT: &str = "11111111-2222-3333-4444-555555555555";
    const APP: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    fn minimal() -> Settings {
        Settings {
            tenant_id: Some(TENANT.into()),
            app_id: Some(APP.into()),
            app_secret: Some(SecretString::new("secret".into())),
            ..Settings::default()
        }
    }

    #[test]
    fn test_guid_format() {
        assert!(is_guid(TENANT));
        assert!(is_guid("ABCDEF01-2345-6789-abcd-ef0123456789"));
        assert!(!is_guid("11111111-2222-3333-4444-55555555555"));
        assert!(!is_guid("11111111222233334444555555555555"));
        assert!(!is_guid("1111111g-2222-3333-4444-555555555555"));
        assert!(!is_guid("{11111111-2222-3333-4444-555555555555}"));
        assert!(!is_guid("urn:uuid:11111111-2222-3333-4444-555555555555"));
        assert!(!is_guid("111111112-222-3333-4444-555555555555"));
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::resolve(minimal()).unwrap();

        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.proxy, ProxySetting::Environment);
        assert_eq!(config.scope, QueryScope::Tenant);
        assert!(config.services.is_empty());
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(matches!(config.secret, SecretSource::Literal(_)));
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let err = AgentConfig::resolve(Settings {
            tenant_id: None,
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("tenant-id")));

        let err = AgentConfig::resolve(Settings {
            app_id: Some("my-app".into()),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGuid { field: "app-id", .. }));
    }

    #[test]
    fn test_secret_is_required() {
        let err = AgentConfig::resolve(Settings {
            app_secret: None,
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("app-secret")));
    }

    #[test]
    fn test_stored_secret_uses_given_store() {
        let config = AgentConfig::resolve(Settings {
            app_secret: None,
            app_secret_id: Some("azure".into()),
            password_store: Some(PathBuf::from("/tmp/stored_passwords")),
            ..minimal()
        })
        .unwrap();

        match config.secret {
            SecretSource::Stored { id, store } => {
                assert_eq!(id, "azure");
                assert_eq!(store, PathBuf::from("/tmp/stored_passwords"));
            }
            other => panic!("unexpected secret source {other:?}"),
        }
    }

    #[test]
    fn test_timeout_range() {
        for (timeout, ok) in [(2, false), (3, true), (600, true), (601, false)] {
            let result = AgentConfig::resolve(Settings {
                timeout: Some(timeout),
                ..minimal()
            });
            assert_eq!(result.is_ok(), ok, "timeout {timeout}");
        }
    }

    #[test]
    fn test_services_and_filters() {
        let config = AgentConfig::resolve(Settings {
            services_to_monitor: Some(vec![
                "azure_arc_states".into(),
                "azure_vm_extensions".into(),
            ]),
            filter_management_groups: Some(vec!["mg-1".into(), " ".into()]),
            filter_subscriptions: Some(vec!["".into()]),
            ..minimal()
        })
        .unwrap();

        assert!(config.services.contains(Service::ArcState));
        assert!(config.services.contains(Service::VmExtensions));
        assert_eq!(config.scope, QueryScope::ManagementGroups(vec!["mg-1".into()]));

        let err = AgentConfig::resolve(Settings {
            filter_subscriptions: Some(vec!["sub".into()]),
            filter_management_groups: Some(vec!["mg".into()]),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFilters));

        let err = AgentConfig::resolve(Settings {
            services_to_monitor: Some(vec!["azure_sql".into()]),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownService(_)));
    }

    #[test]
    fn test_command_line_wins_over_file() {
        let file = Settings {
            tenant_id: Some("00000000-0000-0000-0000-000000000000".into()),
            app_secret_env: Some("AZURE_SECRET".into()),
            filter_subscriptions: Some(vec!["from-file".into()]),
            timeout: Some(30),
            proxy: Some("NO_PROXY".into()),
            ..Settings::default()
        };
        let cli = Settings {
            filter_management_groups: Some(vec!["from-cli".into()]),
            ..minimal()
        };

        let config = AgentConfig::resolve(cli.or(file)).unwrap();

        assert_eq!(config.tenant_id, TENANT);
        assert!(matches!(config.secret, SecretSource::Literal(_)));
        assert_eq!(config.scope, QueryScope::ManagementGroups(vec!["from-cli".into()]));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.proxy, ProxySetting::Direct);
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tenant_id": "{TENANT}", "app_id": "{APP}", "app_secret_env": "AZ", "services_to_monitor": ["azure_arc_states"], "timeout": 20}}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        let config = AgentConfig::resolve(settings).unwrap();

        assert!(config.services.contains(Service::ArcState));
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert!(matches!(config.secret, SecretSource::Env(ref var) if var == "AZ"));
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"app_secret": "plain"}}"#).unwrap();

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_custom_endpoints() {
        let config = AgentConfig::resolve(Settings {
            management_host: Some("http://127.0.0.1:9000".into()),
            ..minimal()
        })
        .unwrap();
        assert_eq!(
            config.endpoints.resource_graph_url(),
            "http://127.0.0.1:9000/providers/Microsoft.ResourceGraph/resources?api-version=2021-03-01"
        );

        let err = AgentConfig::resolve(Settings {
            authority_host: Some("login".into()),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
