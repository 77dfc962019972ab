//! SQL*Plus command assembly and streaming execution.
use crate::credentials::Credentials;
use crate::error::{RunnerError, RunnerResult};
use crate::sink::LineSink;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

pub const SQLPLUS_TRY_LOGIN_JUST_ONCE: &str = "-L";
pub const SQLPLUS_VERSION: &str = "-v";

/// One argv position. The credentials argument keeps a masked twin so the
/// statement can be printed safely.
#[derive(Debug, Clone)]
struct Arg {
    value: String,
    display: String,
}

impl Arg {
    fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            display: value.clone(),
            value,
        }
    }
}

/// A fully assembled child process invocation.
#[derive(Debug, Clone)]
pub struct SqlPlusCommand {
    program: PathBuf,
    args: Vec<Arg>,
    env: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl SqlPlusCommand {
    /// `{sqlplus} -L user/password[@instance] @{script}`
    pub fn script(
        program: &Path,
        credentials: &Credentials,
        instance: Option<&str>,
        script: &Path,
        env: BTreeMap<String, String>,
        working_dir: &Path,
    ) -> Self {
        let connect = Arg {
            value: credentials.connect_string(instance),
            display: credentials.masked_connect_string(instance),
        };
        Self {
            program: program.to_path_buf(),
            args: vec![
                Arg::plain(SQLPLUS_TRY_LOGIN_JUST_ONCE),
                connect,
                Arg::plain(format!("@{}", script.display())),
            ],
            env,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// `{sqlplus} -v`
    pub fn version(program: &Path, env: BTreeMap<String, String>, working_dir: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: vec![Arg::plain(SQLPLUS_VERSION)],
            env,
            working_dir: working_dir.to_path_buf(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Real argv, password included. Only for handing to the OS.
    pub fn argv(&self) -> Vec<String> {
        self.args.iter().map(|arg| arg.value.clone()).collect()
    }

    /// Shell-quoted statement with the password masked.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.display().to_string());
        parts.extend(self.args.iter().map(|arg| arg.display.clone()));
        shell_words::join(parts)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv());
        cmd.envs(&self.env);
        cmd.current_dir(&self.working_dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Spawn, stream merged stdout/stderr to `sink` line by line, and block
    /// until exit. Returns the exit code.
    pub fn run_streaming(&self, sink: &mut dyn LineSink) -> RunnerResult<i32> {
        let mut child = self.to_command().spawn().map_err(|source| RunnerError::Launch {
            program: self.program.clone(),
            source,
        })?;
        tracing::debug!(pid = child.id(), program = %self.program.display(), "spawned sqlplus");

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        for line in rx {
            sink.line(&line);
        }
        join_readers(readers, &self.program);

        let status = child
            .wait()
            .map_err(|source| RunnerError::io("wait for sqlplus", source))?;
        let code = exit_code(&status);
        tracing::debug!(code, "sqlplus exited");
        Ok(code)
    }
}

/// Wait for the reader threads. Returns how many panicked; each one is
/// logged since its share of the output was lost.
fn join_readers(readers: Vec<thread::JoinHandle<()>>, program: &Path) -> usize {
    let mut panicked = 0;
    for reader in readers {
        if reader.join().is_err() {
            panicked += 1;
            tracing::warn!(
                program = %program.display(),
                "output reader thread panicked; output may be incomplete"
            );
        }
    }
    panicked
}

fn forward_lines<R: Read + Send + 'static>(
    stream: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Exit code of the child; a signal death on Unix maps to `128 + signal`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    signal_exit_code(status)
}

#[cfg(unix)]
fn signal_exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|signal| 128 + signal).unwrap_or(-1)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: &ExitStatus) -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::HIDDEN_PASSWORD;
    use crate::sink::MemorySink;

    fn script_command() -> SqlPlusCommand {
        SqlPlusCommand::script(
            Path::new("/opt/oracle/bin/sqlplus"),
            &Credentials::new("scott", "tiger"),
            Some("orcl"),
            Path::new("/work/a.sql"),
            BTreeMap::new(),
            Path::new("/work"),
        )
    }

    #[test]
    fn script_argv_has_login_once_credentials_and_script() {
        let cmd = script_command();
        assert_eq!(
            cmd.argv(),
            vec!["-L", "scott/tiger@orcl", "@/work/a.sql"]
        );
    }

    #[test]
    fn display_masks_password() {
        let display = script_command().display();
        assert!(!display.contains("tiger"));
        assert!(display.contains(&format!("scott/{HIDDEN_PASSWORD}@orcl")));
        assert!(display.starts_with("/opt/oracle/bin/sqlplus -L"));
    }

    #[test]
    fn version_argv() {
        let cmd = SqlPlusCommand::version(
            Path::new("/opt/oracle/bin/sqlplus"),
            BTreeMap::new(),
            Path::new("/work"),
        );
        assert_eq!(cmd.argv(), vec!["-v"]);
    }

    #[test]
    fn launch_failure_is_wrapped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cmd = SqlPlusCommand::version(
            &dir.path().join("no-such-sqlplus"),
            BTreeMap::new(),
            dir.path(),
        );
        let mut sink = MemorySink::new();
        let err = cmd.run_streaming(&mut sink).expect_err("spawn fails");
        assert!(matches!(err, RunnerError::Launch { .. }));
    }

    #[test]
    fn panicked_reader_is_counted() {
        let readers = vec![
            thread::spawn(|| {}),
            thread::spawn(|| panic!("reader failed")),
        ];
        assert_eq!(join_readers(readers, Path::new("/opt/oracle/bin/sqlplus")), 1);
    }

    #[cfg(unix)]
    #[test]
    fn streams_stdout_and_stderr_and_reports_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        let cmd = SqlPlusCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec![
                Arg::plain("-c"),
                Arg::plain("echo \"$GREETING\"; echo oops >&2; exit 3"),
            ],
            env,
            working_dir: dir.path().to_path_buf(),
        };
        let mut sink = MemorySink::new();
        let code = cmd.run_streaming(&mut sink).expect("run");
        assert_eq!(code, 3);
        assert!(sink.lines.contains(&"hello".to_string()));
        assert!(sink.lines.contains(&"oops".to_string()));
    }
}
