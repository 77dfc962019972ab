//! CLI argument parsing for the SQL*Plus runner.
//!
//! The CLI plays the role of the build host: it gathers settings,
//! credentials and the script, then hands a fixed configuration to the core.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_PASSWORD_ENV: &str = "SQLPLUS_PASSWORD";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "sqlplus-runner",
    version,
    about = "Run SQL*Plus scripts as a build step",
    after_help = "Commands:\n  init                       Write a settings stub and an empty credentials store\n  run --script-file <path>   Run a workspace script through SQL*Plus\n  run --script <text>        Run an inline script through SQL*Plus\n  version                    Print the SQL*Plus version\n  resolve                    Show the resolved ORACLE_HOME, SQL*Plus and TNS_ADMIN\n\nExamples:\n  sqlplus-runner init\n  sqlplus-runner run --credentials-id prod --instance ORCL --script-file db/migrate.sql\n  SQLPLUS_PASSWORD=tiger sqlplus-runner run --user scott --script 'select 1 from dual;'\n  sqlplus-runner resolve --oracle-home /opt/oracle --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Settings directory (defaults to $SQLPLUS_RUNNER_SETTINGS or the user config dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub settings: Option<PathBuf>,

    /// Emit internal diagnostics on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Run(RunArgs),
    Version(VersionArgs),
    Resolve(ResolveArgs),
}

/// Init command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write a settings stub and an empty credentials store")]
pub struct InitArgs {
    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

/// Per-step overrides and execution location, shared by every command that
/// resolves an Oracle home.
#[derive(Args, Debug, Clone, Default)]
pub struct HomeArgs {
    /// Per-step ORACLE_HOME override
    #[arg(long, value_name = "DIR")]
    pub oracle_home: Option<String>,

    /// Per-step SQL*Plus executable override
    #[arg(long, value_name = "PATH")]
    pub sqlplus_home: Option<String>,

    /// Per-step TNS_ADMIN override
    #[arg(long, value_name = "DIR")]
    pub tns_admin: Option<String>,

    /// Build workspace (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Treat paths as belonging to a remote worker; local existence checks are skipped
    #[arg(long)]
    pub worker: bool,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Run a SQL*Plus script")]
pub struct RunArgs {
    /// Credentials id in the credentials store
    #[arg(long, value_name = "ID", conflicts_with = "user")]
    pub credentials_id: Option<String>,

    /// Database user (password read from --password-env)
    #[arg(long, value_name = "NAME", required_unless_present = "credentials_id")]
    pub user: Option<String>,

    /// Environment variable holding the password for --user
    #[arg(long, value_name = "VAR", default_value = DEFAULT_PASSWORD_ENV)]
    pub password_env: String,

    /// Instance (TNS alias); omit for the local database
    #[arg(long, value_name = "NAME")]
    pub instance: Option<String>,

    /// Script file relative to the workspace
    #[arg(long, value_name = "PATH", group = "script_source")]
    pub script_file: Option<PathBuf>,

    /// Inline script body
    #[arg(long, value_name = "SQL", group = "script_source")]
    pub script: Option<String>,

    /// Read the inline script body from stdin
    #[arg(long, group = "script_source")]
    pub script_stdin: bool,

    #[command(flatten)]
    pub homes: HomeArgs,

    /// Skip the SQL*Plus version banner for this run
    #[arg(long)]
    pub hide_version: bool,

    /// Print [DEBUG] lines to the build log for this run
    #[arg(long)]
    pub debug: bool,
}

/// Version command inputs.
#[derive(Parser, Debug)]
#[command(about = "Print the SQL*Plus version")]
pub struct VersionArgs {
    #[command(flatten)]
    pub homes: HomeArgs,

    /// Print [DEBUG] lines
    #[arg(long)]
    pub debug: bool,
}

/// Resolve command inputs.
#[derive(Parser, Debug)]
#[command(about = "Resolve ORACLE_HOME, SQL*Plus and TNS_ADMIN without running anything")]
pub struct ResolveArgs {
    #[command(flatten)]
    pub homes: HomeArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
