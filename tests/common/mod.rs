//! Shared test infrastructure for integration tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tempfile::TempDir;

pub const PASSWORD: &str = "s3cret-pw";

/// Stands in for SQL*Plus: prints a version banner for `-v`, otherwise echoes
/// the user, the child environment and the script body, then exits with
/// `FAKE_SQLPLUS_EXIT`.
const FAKE_SQLPLUS: &str = r#"#!/bin/sh
if [ "$1" = "-v" ]; then
  echo "SQL*Plus: Release 19.0.0.0.0 - Production"
  exit 0
fi
echo "user=${2%%/*}"
echo "ORACLE_HOME=$ORACLE_HOME"
echo "TNS_ADMIN=$TNS_ADMIN"
echo "from stderr" >&2
cat "${3#@}"
exit "${FAKE_SQLPLUS_EXIT:-0}"
"#;

/// Oracle home with `bin/sqlplus` and `network/admin/tnsnames.ora`, built once
/// per test binary so no test forks while the executable is still open for
/// writing.
pub fn oracle_home() -> &'static Path {
    static HOME: OnceLock<TempDir> = OnceLock::new();
    HOME.get_or_init(|| {
        let dir = tempfile::tempdir().expect("create oracle home");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).expect("create bin");
        let sqlplus = bin.join("sqlplus");
        fs::write(&sqlplus, FAKE_SQLPLUS).expect("write fake sqlplus");
        fs::set_permissions(&sqlplus, fs::Permissions::from_mode(0o755)).expect("chmod sqlplus");
        let admin = dir.path().join("network").join("admin");
        fs::create_dir_all(&admin).expect("create network/admin");
        fs::write(admin.join("tnsnames.ora"), "ORCL = (DESCRIPTION = )\n")
            .expect("write tnsnames.ora");
        dir
    })
    .path()
}

/// Isolated settings directory and workspace for one test.
pub struct Sandbox {
    pub settings: TempDir,
    pub workspace: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            settings: tempfile::tempdir().expect("create settings dir"),
            workspace: tempfile::tempdir().expect("create workspace"),
        }
    }

    pub fn workspace_file(&self, name: &str) -> PathBuf {
        self.workspace.path().join(name)
    }

    /// Base command: isolated settings, clean Oracle variables, password set.
    pub fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sqlplus-runner"));
        cmd.arg("--settings")
            .arg(self.settings.path())
            .arg(subcommand)
            .env_remove("ORACLE_HOME")
            .env_remove("TNS_ADMIN")
            .env_remove("RUST_LOG")
            .env("SQLPLUS_PASSWORD", PASSWORD);
        cmd
    }

    /// `run` against the fake home with `--user scott`.
    pub fn run(&self, extra: &[&str]) -> Output {
        self.command("run")
            .arg("--user")
            .arg("scott")
            .arg("--oracle-home")
            .arg(oracle_home())
            .arg("--workspace")
            .arg(self.workspace.path())
            .args(extra)
            .output()
            .expect("run sqlplus-runner")
    }

    /// Names of leftover temporary scripts in the workspace.
    pub fn temp_scripts(&self) -> Vec<String> {
        fs::read_dir(self.workspace.path())
            .expect("read workspace")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("temp-script-"))
            .collect()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
