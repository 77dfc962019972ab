//! Command workflows: turn CLI arguments, settings and credentials into a
//! fixed run configuration and drive the core.
use crate::cli::{HomeArgs, InitArgs, ResolveArgs, RunArgs, VersionArgs};
use crate::config::{
    load_settings, settings_stub, HomeOverrides, RunConfiguration, ScriptSource, SettingsPaths,
};
use crate::credentials::{CredentialStore, Credentials};
use crate::env::EnvSnapshot;
use crate::error::{ConfigurationError, RunnerError};
use crate::host::ExecutionNode;
use crate::resolve::{resolve_environment, ResolvedEnvironment};
use crate::runner::{check_version, RunContext, ScriptRunner};
use crate::sink::StdoutSink;
use crate::util::{display_path, write_atomic};
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

pub fn run_init(paths: &SettingsPaths, args: &InitArgs) -> Result<()> {
    let settings_path = paths.settings_path();
    let credentials_path = paths.credentials_path();
    for path in [&settings_path, &credentials_path] {
        if path.is_file() && !args.force {
            return Err(anyhow!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ));
        }
    }
    write_atomic(&settings_path, settings_stub()?.as_bytes())?;
    println!("wrote {}", settings_path.display());
    let store = serde_json::to_vec_pretty(&CredentialStore::empty())
        .context("serialize credentials store")?;
    write_atomic(&credentials_path, &store)?;
    println!("wrote {}", credentials_path.display());
    Ok(())
}

/// Outcome of `run`, mapped to the process exit status by `main`.
pub enum RunStatus {
    Succeeded,
    Failed(RunnerError),
}

pub fn run_run(paths: &SettingsPaths, args: &RunArgs) -> Result<RunStatus> {
    let mut settings = load_settings(paths)?;
    settings.hide_sqlplus_version |= args.hide_version;
    settings.debug |= args.debug;

    let env = EnvSnapshot::from_process();
    let credentials = match resolve_credentials(paths, args, &env)? {
        Ok(credentials) => credentials,
        Err(err) => return Ok(RunStatus::Failed(err.into())),
    };
    let script = read_script_source(args)?;
    let config = RunConfiguration {
        credentials,
        instance: args.instance.clone(),
        script,
        homes: home_overrides(&args.homes),
        settings,
    };
    let context = run_context(&args.homes, env)?;
    tracing::info!(
        workspace = %context.workspace.display(),
        node = ?context.node,
        script_type = ?config.script.script_type(),
        "starting sqlplus run"
    );

    let mut sink = StdoutSink;
    let mut runner = ScriptRunner::new(config, context);
    match runner.run(&mut sink) {
        Ok(report) => {
            tracing::info!(
                exit_code = report.exit_code,
                script = %report.script.display(),
                oracle_home = %report.resolved.oracle_home.display(),
                state = ?runner.state(),
                "sqlplus run succeeded"
            );
            Ok(RunStatus::Succeeded)
        }
        Err(err) => {
            tracing::debug!(state = ?runner.state(), "run ended");
            Ok(RunStatus::Failed(err))
        }
    }
}

pub fn run_version(paths: &SettingsPaths, args: &VersionArgs) -> Result<RunStatus> {
    let mut settings = load_settings(paths)?;
    settings.debug |= args.debug;
    let config = RunConfiguration {
        credentials: Credentials::new("", ""),
        instance: None,
        script: ScriptSource::UserDefined(String::new()),
        homes: home_overrides(&args.homes),
        settings,
    };
    let context = run_context(&args.homes, EnvSnapshot::from_process())?;
    let mut sink = StdoutSink;
    Ok(match check_version(&config, &context, &mut sink) {
        Ok(()) => RunStatus::Succeeded,
        Err(err) => RunStatus::Failed(err),
    })
}

pub fn run_resolve(paths: &SettingsPaths, args: &ResolveArgs) -> Result<RunStatus> {
    let settings = load_settings(paths)?;
    let context = run_context(&args.homes, EnvSnapshot::from_process())?;
    let resolved = match resolve_environment(
        &home_overrides(&args.homes),
        &settings,
        &context.env,
        context.node,
        &context.workspace,
    ) {
        Ok(resolved) => resolved,
        Err(err) => return Ok(RunStatus::Failed(err.into())),
    };
    if args.json {
        let text = serde_json::to_string_pretty(&resolved).context("serialize resolution")?;
        println!("{text}");
    } else {
        print!("{}", render_resolved(&resolved, &context.workspace));
    }
    Ok(RunStatus::Succeeded)
}

fn render_resolved(resolved: &ResolvedEnvironment, workspace: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "ORACLE_HOME   {} ({:?})\n",
        resolved.oracle_home.display(),
        resolved.home_source
    ));
    out.push_str(&format!(
        "SQL*Plus      {} ({:?})\n",
        resolved.sqlplus.display(),
        resolved.sqlplus_source
    ));
    out.push_str(&format!(
        "TNS_ADMIN     {} ({:?})\n",
        resolved.tns_admin.display(),
        resolved.tns_admin_source
    ));
    out.push_str(&format!(
        "Work dir      {}\n",
        display_path(&resolved.working_dir, Some(workspace))
    ));
    for (key, value) in &resolved.env {
        out.push_str(&format!("env {key}={value}\n"));
    }
    out
}

fn home_overrides(args: &HomeArgs) -> HomeOverrides {
    HomeOverrides {
        custom_oracle_home: args.oracle_home.clone(),
        custom_sqlplus_home: args.sqlplus_home.clone(),
        custom_tns_admin: args.tns_admin.clone(),
    }
}

fn run_context(args: &HomeArgs, env: EnvSnapshot) -> Result<RunContext> {
    let workspace = match &args.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("determine current directory")?,
    };
    let workspace = if workspace.is_absolute() {
        workspace
    } else {
        std::env::current_dir()
            .context("determine current directory")?
            .join(workspace)
    };
    let node = if args.worker {
        ExecutionNode::Worker
    } else {
        ExecutionNode::Controller
    };
    Ok(RunContext {
        workspace,
        node,
        env,
    })
}

/// Credentials from the store by id, or `--user` plus a password variable.
/// The inner error is a configuration failure that should fail the run, not
/// the tool.
fn resolve_credentials(
    paths: &SettingsPaths,
    args: &RunArgs,
    env: &EnvSnapshot,
) -> Result<Result<Credentials, ConfigurationError>> {
    if let Some(id) = args.credentials_id.as_deref() {
        let store_path = paths.credentials_path();
        if !store_path.is_file() {
            tracing::warn!(path = %store_path.display(), "credentials store missing");
            return Ok(Err(ConfigurationError::InvalidCredentials(id.to_string())));
        }
        let store = CredentialStore::load(&store_path)?;
        return Ok(store.resolve(id));
    }
    let user = args
        .user
        .as_deref()
        .map(str::trim)
        .filter(|user| !user.is_empty());
    let Some(user) = user else {
        return Ok(Err(ConfigurationError::InvalidCredentials(String::new())));
    };
    let password = env.get(&args.password_env).unwrap_or_default();
    if password.is_empty() {
        tracing::warn!(var = %args.password_env, "password variable is empty or unset");
        return Ok(Err(ConfigurationError::InvalidCredentials(user.to_string())));
    }
    Ok(Ok(Credentials::new(user, password)))
}

fn read_script_source(args: &RunArgs) -> Result<ScriptSource> {
    if let Some(path) = &args.script_file {
        return Ok(ScriptSource::FileReference(path.clone()));
    }
    if let Some(body) = &args.script {
        return Ok(ScriptSource::UserDefined(body.clone()));
    }
    if args.script_stdin {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("read script from stdin")?;
        return Ok(ScriptSource::UserDefined(body));
    }
    Ok(ScriptSource::FileReference(PathBuf::new()))
}
