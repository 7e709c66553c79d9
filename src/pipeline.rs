// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pipeline orchestration.
//!
//! The CI platform runs two programs back to back. The first computes the
//! change set and writes it to disk, the second renders every changed
//! dashboard and optionally deploys the output tree:
//!
//! ```text
//! grafship-diff: Init -> DiffComputed
//! grafship:      Init -> Rendered -> FolderEnsured -> DashboardsUploaded -> Done
//! ```
//!
//! Any error aborts the run where it stands. Nothing is checkpointed, so a
//! failed run is simply started over.

use crate::{
    change::ChangeSetError,
    config::{Environment, Settings},
    deploy::{DeployError, Deployer},
    diff::{self, DiffError},
    grafana::DashboardApi,
    render::{RenderError, Renderer},
    target::Target,
    tools::Toolchain,
    uid::{clean_branch, FolderUid},
    vcs::VersionControl,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::create_dir_all,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Stage a pipeline run has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    DiffComputed,
    Rendered,
    FolderEnsured,
    DashboardsUploaded,
    Done,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Init => "init",
            Self::DiffComputed => "diff computed",
            Self::Rendered => "rendered",
            Self::FolderEnsured => "folder ensured",
            Self::DashboardsUploaded => "dashboards uploaded",
            Self::Done => "done",
        };
        fmt.write_str(name)
    }
}

fn enter(stage: Stage) -> Stage {
    info!("stage: {stage}");
    stage
}

/// Everything needed to deploy rendered dashboards.
#[derive(Debug)]
pub struct DeployRequest<A>
where
    A: DashboardApi,
{
    /// Project the pipeline builds for.
    pub project: String,

    /// Server the branch deploys to.
    pub target: Target,

    /// Client for that server.
    pub api: A,
}

/// Compute change set and persist it for the render program.
///
/// # Errors
///
/// - Return [`PipelineError::Diff`] if change set cannot be computed.
/// - Return [`PipelineError::ChangeSet`] if change set cannot be written.
#[instrument(skip_all, level = "debug")]
pub async fn compute_diff(
    settings: &Settings,
    environment: &Environment,
    vcs: &impl VersionControl,
    workdir: impl AsRef<Path>,
) -> Result<Stage> {
    enter(Stage::Init);
    let change_set = diff::calculate(environment, settings, vcs).await?;
    change_set.write(workdir.as_ref().join(&settings.change_set))?;

    Ok(enter(Stage::DiffComputed))
}

/// Render changed dashboards, then deploy them if requested.
///
/// Deployment only happens when the change set mentioned at least one
/// dashboard. Rendering always finishes completely before the first upload.
///
/// # Errors
///
/// - Return [`PipelineError::CreateDir`] if output tree cannot be created.
/// - Return [`PipelineError::Render`] if rendering fails.
/// - Return [`PipelineError::Deploy`] if deployment fails.
#[instrument(skip_all, level = "debug")]
pub async fn build<T, A>(
    settings: &Settings,
    environment: &Environment,
    workdir: impl AsRef<Path>,
    toolchain: T,
    deploy: Option<DeployRequest<A>>,
) -> Result<Stage>
where
    T: Toolchain + Clone,
    A: DashboardApi,
{
    enter(Stage::Init);
    let workdir = workdir.as_ref();
    let branch = clean_branch(&environment.branch);

    let renderer = Renderer::new(settings, workdir, toolchain.clone());
    create_dir_all(renderer.dist_dir()).map_err(|err| PipelineError::CreateDir {
        source: err,
        path: renderer.dist_dir().to_path_buf(),
    })?;

    let found = renderer
        .render_changed(workdir.join(&settings.change_set), &branch)
        .await?;
    let stage = enter(Stage::Rendered);

    let Some(request) = deploy else {
        return Ok(stage);
    };

    if !found {
        info!("nothing to deploy for {}", request.project);
        return Ok(stage);
    }

    info!("deploy project {} to {}", request.project, request.target);
    let folder_uid = FolderUid::derive(&branch);
    let deployer = Deployer::new(toolchain, request.api, settings.exclude_markers.clone());

    deployer.ensure_folder(&folder_uid, &branch).await?;
    enter(Stage::FolderEnsured);

    let deployed = deployer.deploy_all(renderer.dist_dir(), &folder_uid).await?;
    enter(Stage::DashboardsUploaded);

    info!(
        "{deployed} dashboards deployed to {} folder {folder_uid}",
        request.target
    );
    Ok(enter(Stage::Done))
}

/// Delete folder of current branch.
///
/// # Errors
///
/// - Return [`PipelineError::Deploy`] if folder cannot be deleted.
pub async fn cleanup<T, A>(environment: &Environment, toolchain: T, api: A) -> Result<()>
where
    T: Toolchain,
    A: DashboardApi,
{
    let folder_uid = FolderUid::derive(&environment.branch);
    Deployer::new(toolchain, api, Vec::new())
        .remove_folder(&folder_uid)
        .await?;

    Ok(())
}

/// Pipeline error types.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Output tree cannot be created.
    #[error("failed to create output directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

/// Friendly result alias :3
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
