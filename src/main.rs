use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod credentials;
mod env;
mod error;
mod files;
mod host;
mod invocation;
mod resolve;
mod runner;
mod sink;
mod util;
mod workflow;

use crate::cli::{Command, RootArgs};
use crate::config::SettingsPaths;
use crate::error::RunnerError;
use crate::sink::{LineSink, StdoutSink};
use crate::workflow::RunStatus;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIGURATION: u8 = 2;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match dispatch(&args) {
        Ok(RunStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(RunStatus::Failed(err)) => report_failure(&err),
        Err(err) => {
            tracing::error!(error = %err, "sqlplus-runner failed");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn dispatch(args: &RootArgs) -> Result<RunStatus> {
    let paths = SettingsPaths::discover(args.settings.as_deref())?;
    tracing::debug!(settings = %paths.root().display(), "settings directory");
    match &args.command {
        Command::Init(init) => workflow::run_init(&paths, init).map(|()| RunStatus::Succeeded),
        Command::Run(run) => workflow::run_run(&paths, run),
        Command::Version(version) => workflow::run_version(&paths, version),
        Command::Resolve(resolve) => workflow::run_resolve(&paths, resolve),
    }
}

/// Print the failure to the build log and pick the process exit status.
fn report_failure(err: &RunnerError) -> ExitCode {
    let mut sink = StdoutSink;
    sink.line(&format!("ERROR: {err}"));
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        sink.line(&format!("  caused by: {cause}"));
        source = cause.source();
    }
    ExitCode::from(exit_status_for(err))
}

fn exit_status_for(err: &RunnerError) -> u8 {
    if err.is_configuration() {
        return EXIT_CONFIGURATION;
    }
    match err.exit_code() {
        Some(code) => u8::try_from(code)
            .ok()
            .filter(|code| *code != 0)
            .unwrap_or(EXIT_FAILURE),
        None => EXIT_FAILURE,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlplus_runner=debug" } else { "sqlplus_runner=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
