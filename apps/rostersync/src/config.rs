//! Run configuration: command-line overrides on top of environment variables.

use std::path::PathBuf;

use rostersync_engine::runner::SyncOptions;

pub const DEFAULT_STATUS_FILE: &str = "out/tables/status.csv";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Values given on the command line. `None` falls back to the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub directory_url: Option<String>,
    pub custom_domain: Option<String>,
    pub login: Option<String>,
    pub project_id: Option<String>,
    pub provisioning_url: Option<String>,
    pub org_owned_project: Option<bool>,
    pub reinvite: Option<bool>,
    pub fail_on_error: Option<bool>,
    pub status_file: Option<PathBuf>,
    pub write_manifest: Option<bool>,
    pub run_id: Option<String>,
    pub dry_run: bool,
}

/// Resolved configuration for one sync run.
///
/// The [`Debug`] impl redacts the password and the provisioning token.
#[derive(Clone)]
pub struct SyncConfig {
    pub directory_url: String,
    pub custom_domain: Option<String>,
    pub login: String,
    pub password: String,
    pub project_id: String,
    pub provisioning_url: String,
    pub provisioning_token: String,
    pub org_owned_project: bool,
    pub reinvite: bool,
    pub fail_on_error: bool,
    pub request_timeout_secs: u64,
    pub status_file: PathBuf,
    pub write_manifest: bool,
    pub run_id: String,
    pub dry_run: bool,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("directory_url", &self.directory_url)
            .field("custom_domain", &self.custom_domain)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("provisioning_url", &self.provisioning_url)
            .field("provisioning_token", &"[REDACTED]")
            .field("org_owned_project", &self.org_owned_project)
            .field("reinvite", &self.reinvite)
            .field("fail_on_error", &self.fail_on_error)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("status_file", &self.status_file)
            .field("write_manifest", &self.write_manifest)
            .field("run_id", &self.run_id)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key), overrides)
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let optional = |key: &str| {
            reader(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str, flag: &Option<String>| {
            flag.clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| optional(key))
                .ok_or_else(|| ConfigError::MissingVar(key.into()))
        };
        let flag_or_bool = |key: &str, flag: Option<bool>, default: bool| match flag {
            Some(value) => Ok(value),
            None => optional(key).map_or(Ok(default), |raw| parse_bool(key, &raw)),
        };

        let directory_url = required("ROSTERSYNC_DIRECTORY_URL", &overrides.directory_url)?;
        let custom_domain = overrides
            .custom_domain
            .clone()
            .or_else(|| optional("ROSTERSYNC_DIRECTORY_CUSTOM_DOMAIN"));
        let login = required("ROSTERSYNC_LOGIN", &overrides.login)?;
        let password = required("ROSTERSYNC_PASSWORD", &None)?;
        let project_id = required("ROSTERSYNC_PROJECT_ID", &overrides.project_id)?;
        let provisioning_url =
            required("ROSTERSYNC_PROVISIONING_URL", &overrides.provisioning_url)?;
        let provisioning_token = required("ROSTERSYNC_PROVISIONING_TOKEN", &None)?;

        let org_owned_project = flag_or_bool(
            "ROSTERSYNC_ORG_OWNED_PROJECT",
            overrides.org_owned_project,
            true,
        )?;
        let reinvite = flag_or_bool("ROSTERSYNC_REINVITE", overrides.reinvite, false)?;
        let fail_on_error =
            flag_or_bool("ROSTERSYNC_FAIL_ON_ERROR", overrides.fail_on_error, false)?;
        let write_manifest =
            flag_or_bool("ROSTERSYNC_WRITE_MANIFEST", overrides.write_manifest, true)?;

        let request_timeout_secs = match optional("ROSTERSYNC_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("ROSTERSYNC_REQUEST_TIMEOUT_SECS".into(), e.to_string())
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let status_file = overrides
            .status_file
            .clone()
            .or_else(|| optional("ROSTERSYNC_STATUS_FILE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_FILE));

        let run_id = overrides
            .run_id
            .clone()
            .or_else(|| optional("ROSTERSYNC_RUN_ID"))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            directory_url,
            custom_domain,
            login,
            password,
            project_id,
            provisioning_url,
            provisioning_token,
            org_owned_project,
            reinvite,
            fail_on_error,
            request_timeout_secs,
            status_file,
            write_manifest,
            run_id,
            dry_run: overrides.dry_run,
        })
    }

    /// Engine options derived from this configuration.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            self_login: self.login.clone(),
            project_id: self.project_id.clone(),
            org_owned_project: self.org_owned_project,
            reinvite_allowed: self.reinvite,
            dry_run: self.dry_run,
            run_id: self.run_id.clone(),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.into(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    /// Create a reader closure from a HashMap (no global env mutation).
    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ROSTERSYNC_DIRECTORY_URL", "https://secure.example.com"),
            ("ROSTERSYNC_LOGIN", "admin@example.com"),
            ("ROSTERSYNC_PASSWORD", "hunter2"),
            ("ROSTERSYNC_PROJECT_ID", "p1"),
            ("ROSTERSYNC_PROVISIONING_URL", "https://provisioning.example.com"),
            ("ROSTERSYNC_PROVISIONING_TOKEN", "storage-token"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config =
            SyncConfig::from_reader(make_reader(required_vars()), &Overrides::default()).unwrap();

        assert_eq!(config.directory_url, "https://secure.example.com");
        assert_eq!(config.custom_domain, None);
        assert!(config.org_owned_project);
        assert!(!config.reinvite);
        assert!(!config.fail_on_error);
        assert!(config.write_manifest);
        assert!(!config.dry_run);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.status_file, PathBuf::from(DEFAULT_STATUS_FILE));
        assert!(uuid::Uuid::parse_str(&config.run_id).is_ok());
    }

    #[test]
    fn test_missing_password() {
        let mut vars = required_vars();
        vars.remove("ROSTERSYNC_PASSWORD");

        let err = SyncConfig::from_reader(make_reader(vars), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
        assert!(err.to_string().contains("ROSTERSYNC_PASSWORD"));
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let mut vars = required_vars();
        vars.insert("ROSTERSYNC_PROJECT_ID", "   ");

        let err = SyncConfig::from_reader(make_reader(vars), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("ROSTERSYNC_PROJECT_ID"));
    }

    #[test]
    fn test_flags_override_environment() {
        let mut vars = required_vars();
        vars.insert("ROSTERSYNC_REINVITE", "false");
        vars.insert("ROSTERSYNC_STATUS_FILE", "/tmp/env.csv");

        let overrides = Overrides {
            project_id: Some("p2".into()),
            reinvite: Some(true),
            status_file: Some(PathBuf::from("/tmp/flag.csv")),
            run_id: Some("run-42".into()),
            dry_run: true,
            ..Overrides::default()
        };
        let config = SyncConfig::from_reader(make_reader(vars), &overrides).unwrap();

        assert_eq!(config.project_id, "p2");
        assert!(config.reinvite);
        assert_eq!(config.status_file, PathBuf::from("/tmp/flag.csv"));

        let options = config.sync_options();
        assert_eq!(options.project_id, "p2");
        assert_eq!(options.self_login, "admin@example.com");
        assert_eq!(options.run_id, "run-42");
        assert!(options.reinvite_allowed);
        assert!(options.dry_run);
    }

    #[test]
    fn test_invalid_boolean() {
        let mut vars = required_vars();
        vars.insert("ROSTERSYNC_ORG_OWNED_PROJECT", "maybe");

        let err = SyncConfig::from_reader(make_reader(vars), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("ROSTERSYNC_ORG_OWNED_PROJECT"));
    }

    #[test]
    fn test_invalid_timeout() {
        let mut vars = required_vars();
        vars.insert("ROSTERSYNC_REQUEST_TIMEOUT_SECS", "soon");

        let err = SyncConfig::from_reader(make_reader(vars), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("ROSTERSYNC_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config =
            SyncConfig::from_reader(make_reader(required_vars()), &Overrides::default()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("storage-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
