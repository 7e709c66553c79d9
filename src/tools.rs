// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External dashboard tooling.
//!
//! Jsonnet expands templated dashboards, jq compacts rendered dashboards
//! before upload. Both sit behind [`Toolchain`] so rendering and deployment
//! logic can be tested without either binary installed.

use crate::{
    config::Settings,
    syscall::{syscall_non_interactive, Result},
    uid::DashboardUid,
};

use async_trait::async_trait;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

/// External tools used to render and compact dashboards.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Expand Jsonnet source with `uid` bound as external string variable.
    ///
    /// Returns standard output of renderer verbatim.
    async fn render_jsonnet(&self, source: &Path, uid: &DashboardUid) -> Result<Vec<u8>>;

    /// Compact JSON file onto a single line.
    async fn compact_json(&self, path: &Path) -> Result<String>;
}

/// Toolchain backed by the jsonnet and jq binaries.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    vendor: Vec<PathBuf>,
    timeout: Duration,
}

impl ExternalTools {
    /// Construct new external toolchain.
    pub fn new(vendor: Vec<PathBuf>, timeout: Duration) -> Self {
        Self { vendor, timeout }
    }

    /// Construct external toolchain from pipeline settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.jsonnet_vendor.clone(), settings.command_timeout())
    }

    fn jsonnet_args(&self, source: &Path, uid: &DashboardUid) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for dir in &self.vendor {
            args.extend([OsString::from("-J"), dir.as_os_str().to_os_string()]);
        }
        args.push(source.as_os_str().to_os_string());
        args.push(OsString::from("--ext-str"));
        args.push(OsString::from(format!("uid={uid}")));

        args
    }
}

#[async_trait]
impl Toolchain for ExternalTools {
    async fn render_jsonnet(&self, source: &Path, uid: &DashboardUid) -> Result<Vec<u8>> {
        syscall_non_interactive("jsonnet", self.jsonnet_args(source, uid), self.timeout).await
    }

    async fn compact_json(&self, path: &Path) -> Result<String> {
        let output = syscall_non_interactive(
            "jq",
            [OsString::from("-c"), ".".into(), path.as_os_str().to_os_string()],
            self.timeout,
        )
        .await?;

        Ok(String::from_utf8_lossy(&output).trim_end().to_string())
    }
}
