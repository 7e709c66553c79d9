// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Process-wide logging shared by both programs.

use std::{fmt::Debug, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log filter to use, taken from `RUST_LOG` and falling back to `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install compact log output.
pub fn init() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter())
        .init();
}

/// Terminate process, logging the error of a failed run.
pub fn exit_with<E: Debug>(result: Result<(), E>) -> ! {
    if let Err(error) = result {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
