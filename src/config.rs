// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Grafship is configured from two places. The CI platform hands over the
//! branch, commit, and credential information through environment variables,
//! which are collected once into an [`Environment`]. Everything else, e.g.,
//! where dashboards live, where rendered output goes, which Grafana servers
//! to talk to, is described by [`Settings`]. Every setting carries a default,
//! so a settings file is only needed to deviate from the conventional layout.

use crate::target::Target;

use serde::{Deserialize, Serialize};
use std::{
    env::VarError,
    fmt::{Debug, Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Branch currently being built.
pub const BRANCH_VAR: &str = "CI_COMMIT_BRANCH";

/// Latest commit present on the branch before the push.
pub const BEFORE_SHA_VAR: &str = "COMMIT_BEFORE_SHA";

/// Grafana basic auth user.
pub const GRAFANA_USER_VAR: &str = "GRAFANA_USER";

/// Grafana basic auth password.
pub const GRAFANA_PASSWORD_VAR: &str = "GRAFANA_PASSWORD";

/// Pipeline settings layout.
///
/// # General Layout
///
/// Top-level keys describe the repository layout and external tooling. The
/// `[grafana]` table describes how to reach the Grafana servers.
///
/// ```toml
/// trunk_branch = "master"
/// dashboards_root = "dashboards"
/// dist_dir = "dist"
/// change_set = "git-diff"
/// jsonnet_vendor = ["vendor"]
/// exclude_markers = ["rlt"]
/// command_timeout_secs = 300
///
/// [grafana]
/// dev_url = "${GRAFANA_SERVER_DEV}"
/// test_url = "${GRAFANA_SERVER_TEST}"
/// timeout_secs = 30
/// fail_on_status = true
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Branch whose builds enumerate the whole repository instead of diffing.
    pub trunk_branch: String,

    /// Top-level directory holding dashboard sources.
    pub dashboards_root: String,

    /// Directory rendered artifacts are written to.
    pub dist_dir: PathBuf,

    /// Newline-delimited listing of changed paths.
    pub change_set: PathBuf,

    /// Library search paths handed to jsonnet through `-J`.
    pub jsonnet_vendor: Vec<PathBuf>,

    /// Directory name fragments excluded from deployment.
    pub exclude_markers: Vec<String>,

    /// Upper bound on any single external command.
    pub command_timeout_secs: u64,

    /// Grafana server settings.
    pub grafana: GrafanaSettings,
}

impl Settings {
    /// Load settings from optional settings file.
    ///
    /// Falls back to default settings when no path is given.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadSettings`] if settings file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => read_to_string(path)
                .map_err(|err| ConfigError::ReadSettings {
                    source: err,
                    path: path.to_path_buf(),
                })?
                .parse(),
            None => Ok(Self::default()),
        }
    }

    /// Timeout for external commands.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Resolve base URL of Grafana server for target environment.
    ///
    /// Environment placeholders are expanded at call time, because only the
    /// deploy path needs a server at all.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a placeholder names an
    ///   unset variable.
    pub fn server_url(&self, target: Target) -> Result<String> {
        let template = match target {
            Target::Dev => &self.grafana.dev_url,
            Target::Test => &self.grafana.test_url,
        };

        Ok(shellexpand::env(template)?
            .trim_end_matches('/')
            .to_string())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trunk_branch: "master".into(),
            dashboards_root: "dashboards".into(),
            dist_dir: PathBuf::from("dist"),
            change_set: PathBuf::from("git-diff"),
            jsonnet_vendor: vec![PathBuf::from("vendor")],
            exclude_markers: vec!["rlt".into()],
            command_timeout_secs: 300,
            grafana: GrafanaSettings::default(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.dist_dir = expand_path(&settings.dist_dir)?;
        settings.change_set = expand_path(&settings.change_set)?;
        settings.jsonnet_vendor = settings
            .jsonnet_vendor
            .iter()
            .map(expand_path)
            .collect::<Result<Vec<_>>>()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Grafana server settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrafanaSettings {
    /// Base URL of development server. May contain environment placeholders.
    pub dev_url: String,

    /// Base URL of test server. May contain environment placeholders.
    pub test_url: String,

    /// Upper bound on any single HTTP request.
    pub timeout_secs: u64,

    /// Treat HTTP status codes of 400 and above as fatal.
    pub fail_on_status: bool,
}

impl GrafanaSettings {
    /// Timeout for HTTP requests.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GrafanaSettings {
    fn default() -> Self {
        Self {
            dev_url: "${GRAFANA_SERVER_DEV}".into(),
            test_url: "${GRAFANA_SERVER_TEST}".into(),
            timeout_secs: 30,
            fail_on_status: true,
        }
    }
}

/// Which optional environment variables a program needs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Requirements {
    /// Require the before commit, unless the branch equals this trunk branch.
    pub before_sha_unless_trunk: Option<String>,

    /// Require Grafana credentials.
    pub credentials: bool,
}

/// Values handed over by the CI platform.
///
/// Assembled once at startup. Every missing variable is reported together
/// instead of aborting at the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Branch currently being built.
    pub branch: String,

    /// Before commit, if required and present.
    pub before_sha: Option<String>,

    /// Grafana credentials, if required and present.
    pub credentials: Option<Credentials>,
}

impl Environment {
    /// Collect environment from current process.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingEnv`] listing every required variable
    ///   that is unset.
    /// - Return [`ConfigError::ShellExpansion`] if credentials reference
    ///   unset variables.
    pub fn from_env(requirements: &Requirements) -> Result<Self> {
        Self::from_lookup(requirements, |key| std::env::var(key).ok())
    }

    /// Collect environment through arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingEnv`] listing every required variable
    ///   that is unset.
    /// - Return [`ConfigError::ShellExpansion`] if credentials reference
    ///   unset variables.
    pub fn from_lookup(
        requirements: &Requirements,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |key: &str| {
            let value = lookup(key);
            if value.is_none() {
                missing.push(key.to_string());
            }
            value
        };

        let branch = require(BRANCH_VAR);

        let before_sha = match &requirements.before_sha_unless_trunk {
            Some(trunk) if branch.as_deref() != Some(trunk.as_str()) => require(BEFORE_SHA_VAR),
            _ => None,
        };

        let (user, password) = if requirements.credentials {
            (require(GRAFANA_USER_VAR), require(GRAFANA_PASSWORD_VAR))
        } else {
            (None, None)
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv { keys: missing });
        }

        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some(Credentials::expand(&user, &password)?),
            _ => None,
        };

        Ok(Self {
            // INVARIANT: Branch is always required, so it is present here.
            branch: branch.unwrap_or_default(),
            before_sha,
            credentials,
        })
    }
}

/// Grafana basic auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Construct credentials, expanding embedded environment placeholders.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a placeholder names an
    ///   unset variable.
    pub fn expand(user: &str, password: &str) -> Result<Self> {
        Ok(Self {
            user: shellexpand::env(user)?.into_owned(),
            password: shellexpand::env(password)?.into_owned(),
        })
    }
}

impl Debug for Credentials {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn expand_path(path: &PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),

    /// Settings file cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    ReadSettings {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Required environment variables are unset.
    #[error("missing required environment variables: {}", keys.join(", "))]
    MissingEnv { keys: Vec<String> },

    /// Required command line flag is absent.
    #[error("{0}")]
    MissingFlag(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
