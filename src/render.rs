// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dashboard rendering.
//!
//! Dashboard sources live at `<dashboards_root>/<project>/.../<name>.<ext>`.
//! Rendering turns each of them into a concrete JSON artifact at
//! `<dist_dir>/<project>/<name>` whose `uid` is derived from the current
//! branch, and whose `id` is cleared so Grafana treats the upload as a new
//! dashboard or an overwrite of the dashboard with the same uid.
//!
//! # Source Kinds
//!
//! - __JSON__ sources are parsed, patched, and pretty printed with three
//!   spaces of indentation. No key besides `uid` and `id` is touched.
//! - __Jsonnet__ sources are expanded by the jsonnet binary with the uid
//!   bound to the external string variable `uid`. The template is expected to
//!   place it into the dashboard itself. Output keeps a `.json` extension.
//! - Anything else is left alone. This still counts as rendered so an odd
//!   file inside the dashboards tree never blocks a deployment.

use crate::{
    change::{ChangeSet, ChangeSetError},
    config::Settings,
    syscall::SyscallError,
    tools::Toolchain,
    uid::DashboardUid,
};

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use std::{
    fs::{create_dir_all, read_to_string, rename, write},
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Kind of dashboard source, determined by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    Jsonnet,
    Unknown,
}

impl SourceKind {
    pub fn of(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            Some("jsonnet") => Self::Jsonnet,
            _ => Self::Unknown,
        }
    }
}

/// Render dashboard sources into the output tree.
#[derive(Debug, Clone)]
pub struct Renderer<T>
where
    T: Toolchain,
{
    toolchain: T,
    workdir: PathBuf,
    dashboards_root: String,
    dist_dir: PathBuf,
}

impl<T> Renderer<T>
where
    T: Toolchain,
{
    /// Construct new renderer.
    ///
    /// Dashboard sources and relative output paths are resolved against
    /// `workdir`.
    pub fn new(settings: &Settings, workdir: impl Into<PathBuf>, toolchain: T) -> Self {
        let workdir = workdir.into();
        Self {
            toolchain,
            dist_dir: workdir.join(&settings.dist_dir),
            dashboards_root: settings.dashboards_root.clone(),
            workdir,
        }
    }

    /// Root of the output tree.
    pub fn dist_dir(&self) -> &Path {
        self.dist_dir.as_path()
    }

    /// Render every dashboard listed in change set file.
    ///
    /// Returns whether the change set mentioned any dashboard at all, no
    /// matter if each one actually rendered.
    ///
    /// # Errors
    ///
    /// - Return [`RenderError::ChangeSet`] if change set file cannot be read.
    /// - Return any error of [`Renderer::render`].
    pub async fn render_changed(&self, change_set: impl AsRef<Path>, branch: &str) -> Result<bool> {
        info!("render changed dashboards");
        let change_set = ChangeSet::read(change_set)?;
        self.render_all(&change_set, branch).await
    }

    /// Render every dashboard in change set.
    ///
    /// # Errors
    ///
    /// - Return any error of [`Renderer::render`].
    pub async fn render_all(&self, change_set: &ChangeSet, branch: &str) -> Result<bool> {
        let mut found = false;
        for path in change_set.dashboards(&self.dashboards_root) {
            self.render(path, branch).await?;
            found = true;
        }

        if !found {
            info!("no dashboards changed");
        }

        Ok(found)
    }

    /// Render one dashboard source.
    ///
    /// Returns `false` when there is nothing to render, i.e., the source no
    /// longer exists or sits outside of any project directory.
    ///
    /// # Errors
    ///
    /// - Return [`RenderError::CreateDir`] if project output directory cannot
    ///   be created.
    /// - Return [`RenderError::Jsonnet`] if jsonnet fails.
    /// - Return [`RenderError::Parse`] or [`RenderError::NotAnObject`] if JSON
    ///   source is malformed.
    #[instrument(skip(self, source), level = "debug")]
    pub async fn render(&self, source: impl AsRef<Path>, branch: &str) -> Result<bool> {
        let source = source.as_ref();
        let full_path = self.workdir.join(source);
        if !full_path.exists() {
            info!("dashboard {:?} no longer exists, skipping", source.display());
            return Ok(false);
        }

        let (Some(project), Some(file_name)) = (self.project_of(source), source.file_name()) else {
            warn!(
                "dashboard {:?} is not inside a project directory, skipping",
                source.display()
            );
            return Ok(false);
        };

        let project_dir = self.dist_dir.join(project);
        create_dir_all(&project_dir).map_err(|err| RenderError::CreateDir {
            source: err,
            path: project_dir.clone(),
        })?;

        let uid = DashboardUid::derive(branch, file_name);
        match SourceKind::of(source) {
            SourceKind::Jsonnet => {
                info!("render jsonnet {:?} as {uid}", source.display());
                let output = self
                    .toolchain
                    .render_jsonnet(&full_path, &uid)
                    .await
                    .map_err(|err| RenderError::Jsonnet {
                        source: err,
                        path: source.to_path_buf(),
                    })?;
                let artifact = project_dir.join(Path::new(file_name).with_extension("json"));
                write_atomic(&artifact, &output)?;
            }
            SourceKind::Json => {
                info!("render json {:?} as {uid}", source.display());
                let rendered = render_json(&read_source(&full_path)?, &uid, source)?;
                write_atomic(&project_dir.join(file_name), &rendered)?;
            }
            SourceKind::Unknown => {
                warn!(
                    "dashboard {:?} has no known source extension, nothing rendered",
                    source.display()
                );
            }
        }

        Ok(true)
    }

    // INVARIANT: Project is the component right after the dashboards root, and
    // the source must sit at least one level below it.
    fn project_of<'p>(&self, source: &'p Path) -> Option<&'p Path> {
        let mut components = source
            .strip_prefix(&self.dashboards_root)
            .ok()?
            .components();

        let project = match components.next() {
            Some(Component::Normal(project)) => Path::new(project),
            _ => return None,
        };

        components.next().map(|_| project)
    }
}

/// Patch JSON dashboard with uid and cleared id.
///
/// Output is indented with three spaces.
///
/// # Errors
///
/// - Return [`RenderError::Parse`] if source is not valid JSON.
/// - Return [`RenderError::NotAnObject`] if source is not a JSON object.
pub fn render_json(content: &str, uid: &DashboardUid, source: &Path) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_str(content).map_err(|err| RenderError::Parse {
        source: err,
        path: source.to_path_buf(),
    })?;

    let mut dashboard: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => {
            return Err(RenderError::NotAnObject {
                path: source.to_path_buf(),
            })
        }
    };
    dashboard.insert("uid".into(), Value::String(uid.to_string()));
    dashboard.insert("id".into(), Value::Null);

    let mut output = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut output, PrettyFormatter::with_indent(b"   "));
    dashboard
        .serialize(&mut serializer)
        .map_err(RenderError::Serialize)?;

    Ok(output)
}

fn read_source(path: &Path) -> Result<String> {
    read_to_string(path).map_err(|err| RenderError::ReadSource {
        source: err,
        path: path.to_path_buf(),
    })
}

// INVARIANT: Artifacts are either fully written or not replaced at all.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(".{file_name}.tmp"));
    debug!("write artifact {:?}", path.display());

    write(&staging, content)
        .and_then(|_| rename(&staging, path))
        .map_err(|err| RenderError::WriteArtifact {
            source: err,
            path: path.to_path_buf(),
        })
}

/// Dashboard rendering error types.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Change set cannot be loaded.
    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    /// Project output directory cannot be created.
    #[error("failed to create output directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Dashboard source cannot be read.
    #[error("failed to read dashboard at {:?}", path.display())]
    ReadSource {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Dashboard source is not valid JSON.
    #[error("failed to parse dashboard at {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Dashboard source is valid JSON, but not an object.
    #[error("dashboard at {:?} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    /// Patched dashboard cannot be serialized.
    #[error(transparent)]
    Serialize(serde_json::Error),

    /// Jsonnet fails to expand dashboard.
    #[error("failed to render jsonnet dashboard at {:?}", path.display())]
    Jsonnet {
        #[source]
        source: SyscallError,
        path: PathBuf,
    },

    /// Rendered artifact cannot be written.
    #[error("failed to write artifact at {:?}", path.display())]
    WriteArtifact {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RenderError> = std::result::Result<T, E>;
