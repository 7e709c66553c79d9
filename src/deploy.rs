// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dashboard deployment logic.
//!
//! Deployment uploads every rendered artifact beneath the output tree into
//! the Grafana folder of the current branch. Directories whose name contains
//! one of the exclusion markers are skipped along with everything inside of
//! them, e.g., the `rlt` marker keeps realtime drill-down dashboards out of
//! branch folders.

use crate::{
    grafana::{DashboardApi, GrafanaError},
    syscall::SyscallError,
    tools::Toolchain,
    uid::FolderUid,
};

use serde_json::value::RawValue;
use std::{
    fs::read_dir,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Upload rendered dashboards into Grafana.
#[derive(Debug)]
pub struct Deployer<T, A>
where
    T: Toolchain,
    A: DashboardApi,
{
    toolchain: T,
    api: A,
    exclude_markers: Vec<String>,
}

impl<T, A> Deployer<T, A>
where
    T: Toolchain,
    A: DashboardApi,
{
    /// Construct new deployer.
    pub fn new(toolchain: T, api: A, exclude_markers: Vec<String>) -> Self {
        Self {
            toolchain,
            api,
            exclude_markers,
        }
    }

    /// Make sure folder exists on Grafana server.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::Grafana`] if the folder request fails.
    pub async fn ensure_folder(&self, uid: &FolderUid, title: &str) -> Result<()> {
        Ok(self.api.create_folder(uid, title).await?)
    }

    /// Deploy one rendered dashboard into folder.
    ///
    /// Dashboard is compacted through the toolchain before upload.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::Compact`] if the dashboard cannot be compacted.
    /// - Return [`DeployError::InvalidJson`] if compacted output is not JSON.
    /// - Return [`DeployError::Grafana`] if the import request fails.
    #[instrument(skip(self, path), level = "debug")]
    pub async fn deploy_dashboard(&self, path: impl AsRef<Path>, folder_uid: &FolderUid) -> Result<()> {
        let path = path.as_ref();
        info!("deploy {:?}", path.display());

        let compacted = self
            .toolchain
            .compact_json(path)
            .await
            .map_err(|err| DeployError::Compact {
                source: err,
                path: path.to_path_buf(),
            })?;
        let dashboard = RawValue::from_string(compacted).map_err(|err| DeployError::InvalidJson {
            source: err,
            path: path.to_path_buf(),
        })?;

        Ok(self.api.import_dashboard(&dashboard, folder_uid).await?)
    }

    /// Deploy every dashboard beneath root directory into folder.
    ///
    /// Returns number of deployed dashboards.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::ReadDir`] if the output tree cannot be walked.
    /// - Return any error of [`Deployer::deploy_dashboard`].
    pub async fn deploy_all(&self, root: impl AsRef<Path>, folder_uid: &FolderUid) -> Result<usize> {
        info!("deploy dashboards");
        let dashboards = collect_dashboards(root, &self.exclude_markers)?;
        for dashboard in &dashboards {
            self.deploy_dashboard(dashboard, folder_uid).await?;
        }

        Ok(dashboards.len())
    }

    /// Delete folder of a branch from Grafana server.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::Grafana`] if the delete request fails.
    pub async fn remove_folder(&self, uid: &FolderUid) -> Result<()> {
        Ok(self.api.delete_folder(uid).await?)
    }
}

/// Collect every deployable file beneath root directory.
///
/// Walks the tree depth first in sorted path order. Directories whose name
/// contains any exclusion marker are pruned, nested ones included.
///
/// # Errors
///
/// - Return [`DeployError::ReadDir`] if a directory cannot be listed.
pub fn collect_dashboards(
    root: impl AsRef<Path>,
    exclude_markers: &[String],
) -> Result<Vec<PathBuf>> {
    let mut dashboards = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];

    // Use DFS to traverse output tree.
    while let Some(dir) = pending.pop() {
        let mut entries = read_dir(&dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<std::io::Result<Vec<_>>>()
            })
            .map_err(|err| DeployError::ReadDir {
                source: err,
                path: dir.clone(),
            })?;
        entries.sort();

        let mut subdirs = Vec::new();
        for entry in entries {
            if !entry.is_dir() {
                dashboards.push(entry);
                continue;
            }

            let name = entry
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if exclude_markers.iter().any(|marker| name.contains(marker.as_str())) {
                debug!("skip excluded directory {:?}", entry.display());
                continue;
            }

            subdirs.push(entry);
        }

        // INVARIANT: Visit subdirectories in sorted order.
        pending.extend(subdirs.into_iter().rev());
    }

    dashboards.sort();
    Ok(dashboards)
}

/// Dashboard deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Output tree cannot be walked.
    #[error("failed to read directory at {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Rendered dashboard cannot be compacted.
    #[error("failed to compact dashboard at {:?}", path.display())]
    Compact {
        #[source]
        source: SyscallError,
        path: PathBuf,
    },

    /// Compacted dashboard is not valid JSON.
    #[error("compacted dashboard at {:?} is not valid JSON", path.display())]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Grafana request fails.
    #[error(transparent)]
    Grafana(#[from] GrafanaError),
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
