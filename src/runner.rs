//! The run pipeline: resolve, check version, prepare the script, launch,
//! clean up, report.
use crate::config::{RunConfiguration, ScriptSource};
use crate::env::EnvSnapshot;
use crate::error::{ConfigurationError, RunnerError, RunnerResult};
use crate::files;
use crate::host::{host_name, ExecutionNode};
use crate::invocation::SqlPlusCommand;
use crate::resolve::{
    self, child_env, HomeSource, ResolvedEnvironment, SqlPlusSource, TnsAdminSource,
};
use crate::sink::{DebugLog, LineSink};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const LOCAL_DATABASE: &str = "local";

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    ResolvingHome,
    VersionCheck,
    ValidatingScript,
    PreparingScript,
    Launching,
    WaitingForExit,
    CleaningUp,
    Succeeded,
    Failed,
}

/// Where and with what environment the run happens.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workspace: PathBuf,
    pub node: ExecutionNode,
    pub env: EnvSnapshot,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub resolved: ResolvedEnvironment,
    pub script: PathBuf,
    pub exit_code: i32,
}

/// Script handed to SQL*Plus.
enum ScriptArtifact {
    /// Owned by the run and removed at the end.
    Temporary(TempPath),
    /// Lives in the workspace and outlives the run.
    Workspace(PathBuf),
}

impl ScriptArtifact {
    fn path(&self) -> &Path {
        match self {
            ScriptArtifact::Temporary(temp) => temp,
            ScriptArtifact::Workspace(path) => path,
        }
    }

    fn cleanup(self, sink: &mut dyn LineSink) {
        let ScriptArtifact::Temporary(temp) = self else {
            return;
        };
        let path = temp.to_path_buf();
        if let Err(err) = temp.close() {
            tracing::warn!(path = %path.display(), error = %err, "temp script not removed");
            sink.warn(&format!(
                "temporary script {} was not removed: {err}",
                path.display()
            ));
        }
    }
}

pub struct ScriptRunner {
    config: RunConfiguration,
    context: RunContext,
    debug: DebugLog,
    state: RunState,
}

impl ScriptRunner {
    pub fn new(config: RunConfiguration, context: RunContext) -> Self {
        let debug = DebugLog::new(config.debug());
        Self {
            config,
            context,
            debug,
            state: RunState::ResolvingHome,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        tracing::debug!(from = ?self.state, to = ?state, "run state");
        self.state = state;
    }

    fn instance(&self) -> Option<String> {
        crate::config::non_empty(self.config.instance.as_deref())
            .map(|instance| self.context.env.expand(instance))
    }

    /// Execute the whole pipeline once.
    pub fn run(&mut self, sink: &mut dyn LineSink) -> RunnerResult<RunReport> {
        let result = self.run_inner(sink);
        match &result {
            Ok(_) => self.enter(RunState::Succeeded),
            Err(err) => {
                self.enter(RunState::Failed);
                tracing::error!(error = %err, "sqlplus run failed");
            }
        }
        result
    }

    fn run_inner(&mut self, sink: &mut dyn LineSink) -> RunnerResult<RunReport> {
        self.enter(RunState::ResolvingHome);
        sink.banner();
        sink.line("Resolving ORACLE_HOME");
        let resolved = self.resolve(sink)?;

        if !self.config.settings.hide_sqlplus_version {
            self.enter(RunState::VersionCheck);
            self.version_check(&resolved, sink)?;
        }

        self.enter(RunState::ValidatingScript);
        let script = self.validate_script()?;
        sink.banner();
        sink.line(&format!("Using ORACLE_HOME = {}", resolved.oracle_home.display()));
        sink.banner();

        self.enter(RunState::PreparingScript);
        let artifact = self.prepare_script(script, sink)?;
        sink.banner();

        let launched = self.launch(&resolved, artifact.path(), sink);

        self.enter(RunState::CleaningUp);
        let script_path = artifact.path().to_path_buf();
        artifact.cleanup(sink);

        let exit_code = launched?;
        if exit_code != 0 {
            sink.banner();
            sink.line(&format!("Exit code: {exit_code}"));
            sink.banner();
            return Err(RunnerError::ProcessExit { code: exit_code });
        }
        sink.banner();
        Ok(RunReport {
            resolved,
            script: script_path,
            exit_code,
        })
    }

    fn resolve(&self, sink: &mut dyn LineSink) -> RunnerResult<ResolvedEnvironment> {
        let homes = &self.config.homes;
        let settings = &self.config.settings;
        let resolved = resolve::resolve_environment(
            homes,
            settings,
            &self.context.env,
            self.context.node,
            &self.context.workspace,
        )?;

        match resolved.home_source {
            HomeSource::Custom => sink.line("Using custom ORACLE_HOME"),
            HomeSource::Global => sink.line("Using global ORACLE_HOME"),
            HomeSource::Detected => sink.line("Using ORACLE_HOME detected from the environment"),
            HomeSource::GlobalFallback => self.debug.line(
                sink,
                "no ORACLE_HOME override or detection; using the global value anyway",
            ),
        }
        match resolved.sqlplus_source {
            SqlPlusSource::Custom => {
                sink.line("Using custom SQL*Plus");
                sink.line(&format!("SQL*Plus >>> {}", resolved.sqlplus.display()));
            }
            SqlPlusSource::Global => sink.line("Using global SQL*Plus"),
            SqlPlusSource::WorkerFallback => sink.line(&format!(
                "SQL*Plus directory: {}",
                resolved
                    .sqlplus
                    .parent()
                    .unwrap_or(resolved.sqlplus.as_path())
                    .display()
            )),
            SqlPlusSource::OracleHomeBin | SqlPlusSource::OracleHome => self.debug.line(
                sink,
                &format!("found SQL*Plus at {}", resolved.sqlplus.display()),
            ),
        }
        match resolved.tns_admin_source {
            TnsAdminSource::Custom => {
                sink.line("Using custom TNS_ADMIN");
                sink.line(&format!("TNS_ADMIN >>> {}", resolved.tns_admin.display()));
            }
            TnsAdminSource::Global => sink.line("Using global TNS_ADMIN"),
            TnsAdminSource::NetworkAdmin | TnsAdminSource::OracleHome => self.debug.line(
                sink,
                &format!("found tnsnames.ora in {}", resolved.tns_admin.display()),
            ),
            TnsAdminSource::WorkerDefault => {}
        }
        self.debug.line(sink, &format!("detected host = {}", host_name()));
        self.debug.line(sink, &format!("worker node = {}", self.context.node.is_worker()));
        for (key, value) in &resolved.env {
            self.debug.line(sink, &format!("{key} = {value}"));
        }
        Ok(resolved)
    }

    /// Print `sqlplus -v`. Resolution errors are fatal; a non-zero exit is not.
    fn version_check(
        &self,
        resolved: &ResolvedEnvironment,
        sink: &mut dyn LineSink,
    ) -> RunnerResult<()> {
        let command = SqlPlusCommand::version(
            &resolved.sqlplus,
            child_env(&resolved.oracle_home, None),
            &self.context.workspace,
        );
        run_version(&command, &self.debug, sink)
    }

    fn validate_script(&self) -> RunnerResult<ScriptSource> {
        if self.config.script.is_blank() {
            return Err(ConfigurationError::MissingScript.into());
        }
        Ok(match &self.config.script {
            ScriptSource::UserDefined(body) => {
                ScriptSource::UserDefined(self.context.env.expand(body))
            }
            ScriptSource::FileReference(path) => {
                let expanded = self.context.env.expand(&path.to_string_lossy());
                ScriptSource::FileReference(self.context.workspace.join(expanded))
            }
        })
    }

    fn prepare_script(
        &self,
        script: ScriptSource,
        sink: &mut dyn LineSink,
    ) -> RunnerResult<ScriptArtifact> {
        let instance = self.instance();
        let target = self
            .config
            .credentials
            .masked_connect_string(Some(instance.as_deref().unwrap_or(LOCAL_DATABASE)));
        match script {
            ScriptSource::UserDefined(body) => {
                sink.line(&format!("Running defined script on {target}"));
                let temp = files::create_temp_script(&self.context.workspace, &body)
                    .map_err(|source| RunnerError::io("create temporary script", source))?;
                sink.line(&format!("Temporary script: {}", temp.display()));
                Ok(ScriptArtifact::Temporary(temp))
            }
            ScriptSource::FileReference(path) => {
                sink.line(&format!("Running script {} on {target}", path.display()));
                self.debug.line(sink, &format!("testing script {}", path.display()));
                let worker = self.context.node.is_worker();
                if !path.is_file() {
                    if worker {
                        self.debug.line(
                            sink,
                            "script not visible locally; assuming it exists on the worker",
                        );
                        return Ok(ScriptArtifact::Workspace(path));
                    }
                    return Err(ConfigurationError::ScriptNotFound(path).into());
                }
                let appended = files::ensure_exit_directive(&path).map_err(|source| {
                    RunnerError::io(format!("append exit to {}", path.display()), source)
                })?;
                if appended {
                    self.debug.line(sink, "appended exit directive to script");
                }
                Ok(ScriptArtifact::Workspace(path))
            }
        }
    }

    fn launch(
        &mut self,
        resolved: &ResolvedEnvironment,
        script: &Path,
        sink: &mut dyn LineSink,
    ) -> RunnerResult<i32> {
        self.enter(RunState::Launching);
        let instance = self.instance();
        let command = SqlPlusCommand::script(
            &resolved.sqlplus,
            &self.config.credentials,
            instance.as_deref(),
            script,
            resolved.env.clone(),
            &resolved.working_dir,
        );
        self.debug.line(
            sink,
            &format!("Work directory = {}", command.working_dir().display()),
        );
        self.debug.line(sink, &format!("Statement: {}", command.display()));

        self.enter(RunState::WaitingForExit);
        let code = command.run_streaming(sink).inspect_err(|err| {
            sink.line(&format!("Error: {err}"));
        })?;
        sink.line(&format!("Process ended with exit code {code}"));
        Ok(code)
    }
}

fn run_version(
    command: &SqlPlusCommand,
    debug: &DebugLog,
    sink: &mut dyn LineSink,
) -> RunnerResult<()> {
    sink.banner();
    sink.line("Getting SQL*Plus version");
    debug.line(sink, &format!("Statement: {}", command.display()));
    let code = command.run_streaming(sink).inspect_err(|err| {
        sink.line(&format!("Error: {err}"));
    })?;
    sink.line(&format!("Process ended with exit code {code}"));
    if code != 0 {
        tracing::warn!(code, "sqlplus -v exited non-zero");
    }
    sink.banner();
    Ok(())
}

/// Standalone version check: same home and executable resolution as a run.
pub fn check_version(
    config: &RunConfiguration,
    context: &RunContext,
    sink: &mut dyn LineSink,
) -> RunnerResult<()> {
    let selected =
        resolve::select_oracle_home(&config.homes, &config.settings, &context.env);
    let has_override = resolve::sqlplus_override(&config.homes, &config.settings).is_some();
    let oracle_home = resolve::validate_oracle_home(&selected, has_override, context.node)?;
    let (sqlplus, _) =
        resolve::resolve_sqlplus(&oracle_home, &config.homes, &config.settings, context.node)?;
    sink.banner();
    sink.line(&format!("Using ORACLE_HOME = {}", oracle_home.display()));
    let debug = DebugLog::new(config.debug());
    let command = SqlPlusCommand::version(
        &sqlplus,
        child_env(&oracle_home, None),
        &context.workspace,
    );
    run_version(&command, &debug, sink)
}
