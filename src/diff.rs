// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change set calculation.
//!
//! Builds on the trunk branch enumerate the whole repository, so every
//! dashboard is rendered and deployed again. Builds on any other branch only
//! consider the paths that changed since the last commit that was present on
//! the branch before the push.

use crate::{
    change::ChangeSet,
    config::{ConfigError, Environment, Settings, BEFORE_SHA_VAR},
    vcs::{VcsError, VersionControl},
};

use tracing::{info, instrument, warn};

/// Check if commit reference is the all-zero placeholder handed out for the
/// first push of a new branch.
pub fn is_null_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.chars().all(|c| c == '0')
}

/// Calculate change set of current build.
///
/// # Errors
///
/// - Return [`DiffError::Config`] if the before commit is required but unset.
/// - Return [`DiffError::Vcs`] if fetching or diffing fails.
#[instrument(skip(environment, settings, vcs), level = "debug")]
pub async fn calculate(
    environment: &Environment,
    settings: &Settings,
    vcs: &impl VersionControl,
) -> Result<ChangeSet> {
    let branch = environment.branch.as_str();
    if branch == settings.trunk_branch {
        info!("{branch} is trunk, listing every tracked file");
        return Ok(vcs.list_tracked_files()?.into_iter().collect());
    }

    let before = environment
        .before_sha
        .as_deref()
        .ok_or_else(|| ConfigError::MissingEnv {
            keys: vec![BEFORE_SHA_VAR.to_string()],
        })?;

    if is_null_sha(before) {
        warn!("{branch} has no previous commit, listing every tracked file");
        return Ok(vcs.list_tracked_files()?.into_iter().collect());
    }

    vcs.fetch_branch(branch).await?;
    let change_set: ChangeSet = vcs.changed_paths(before, branch)?.into_iter().collect();
    if change_set.is_empty() {
        warn!("nothing changed between {before} and {branch}");
    } else {
        info!("{} paths changed on {branch}", change_set.len());
    }

    Ok(change_set)
}

/// Change set calculation error types.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Friendly result alias :3
pub type Result<T, E = DiffError> = std::result::Result<T, E>;
