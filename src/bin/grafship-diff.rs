// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use grafship::{
    config::{Environment, Requirements, Settings},
    logging, pipeline,
    vcs::Git2Repository,
};

use anyhow::Result;
use clap::Parser;
use std::{env::current_dir, path::PathBuf};
use tracing::info;

/// Remote that branches are fetched from.
const REMOTE: &str = "origin";

/// Compute files changed by the current push and write them to disk.
#[derive(Debug, Clone, Parser)]
#[command(about, override_usage = "grafship-diff [options]", version)]
struct Cli {
    /// Path to pipeline settings file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;
        let requirements = Requirements {
            before_sha_unless_trunk: Some(settings.trunk_branch.clone()),
            credentials: false,
        };
        let environment = Environment::from_env(&requirements)?;

        let workdir = current_dir()?;
        let vcs = Git2Repository::discover(&workdir, REMOTE, settings.command_timeout())?;
        let stage = pipeline::compute_diff(&settings, &environment, &vcs, &workdir).await?;
        info!("pipeline finished at stage: {stage}");

        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    logging::exit_with(Cli::parse().run().await)
}
