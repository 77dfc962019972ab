//! Oracle home, SQL*Plus and TNS_ADMIN resolution.
//!
//! Every rule here is a pure function of the configuration, the environment
//! snapshot and the local filesystem. Filesystem probes are skipped on a
//! worker node because the paths name a remote machine.
use crate::config::{non_empty, GlobalSettings, HomeOverrides};
use crate::env::{EnvSnapshot, ENV_LD_LIBRARY_PATH, ENV_ORACLE_HOME, ENV_TNS_ADMIN};
use crate::error::ConfigurationError;
use crate::files::find_file;
use crate::host::{path_list_separator, sqlplus_executable_name, ExecutionNode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TNSNAMES_ORA: &str = "tnsnames.ora";
const LIB_DIR: &str = "lib";
const BIN_DIR: &str = "bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeSource {
    Custom,
    Global,
    Detected,
    /// Nothing else applied; the global value is used even when empty.
    GlobalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedHome {
    pub path: String,
    pub source: HomeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlPlusSource {
    Custom,
    Global,
    OracleHomeBin,
    OracleHome,
    WorkerFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TnsAdminSource {
    Custom,
    Global,
    WorkerDefault,
    NetworkAdmin,
    OracleHome,
}

/// Everything derived for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEnvironment {
    pub oracle_home: PathBuf,
    pub home_source: HomeSource,
    pub sqlplus: PathBuf,
    pub sqlplus_source: SqlPlusSource,
    pub tns_admin: PathBuf,
    pub tns_admin_source: TnsAdminSource,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Pick the Oracle home by precedence: custom, global, detected, then the
/// global value regardless.
pub fn select_oracle_home(
    homes: &HomeOverrides,
    settings: &GlobalSettings,
    env: &EnvSnapshot,
) -> SelectedHome {
    if let Some(custom) = non_empty(homes.custom_oracle_home.as_deref()) {
        return SelectedHome {
            path: custom.to_string(),
            source: HomeSource::Custom,
        };
    }
    if let Some(global) = non_empty(settings.oracle_home.as_deref()) {
        return SelectedHome {
            path: global.to_string(),
            source: HomeSource::Global,
        };
    }
    if settings.try_to_detect_oracle_home {
        if let Some(detected) = env.non_empty(ENV_ORACLE_HOME) {
            return SelectedHome {
                path: detected.trim().to_string(),
                source: HomeSource::Detected,
            };
        }
    }
    SelectedHome {
        path: settings.oracle_home.clone().unwrap_or_default(),
        source: HomeSource::GlobalFallback,
    }
}

/// Explicit SQL*Plus executable: per-step first, then global.
pub fn sqlplus_override(
    homes: &HomeOverrides,
    settings: &GlobalSettings,
) -> Option<(PathBuf, SqlPlusSource)> {
    if let Some(custom) = non_empty(homes.custom_sqlplus_home.as_deref()) {
        return Some((PathBuf::from(custom), SqlPlusSource::Custom));
    }
    non_empty(settings.sqlplus_home.as_deref())
        .map(|global| (PathBuf::from(global), SqlPlusSource::Global))
}

/// Reject an empty home; on the controller without a SQL*Plus override the
/// directory must also exist.
pub fn validate_oracle_home(
    selected: &SelectedHome,
    has_sqlplus_override: bool,
    node: ExecutionNode,
) -> Result<PathBuf, ConfigurationError> {
    if selected.path.trim().is_empty() {
        return Err(ConfigurationError::MissingOracleHome);
    }
    let home = PathBuf::from(&selected.path);
    if !node.is_worker() && !has_sqlplus_override && !home.exists() {
        return Err(ConfigurationError::InvalidOracleHome(home));
    }
    Ok(home)
}

/// Locate the executable under the Oracle home.
///
/// Order: `{home}/bin`, then `{home}`. A worker falls back to the global
/// home's `bin` because its filesystem cannot be searched from here.
pub fn locate_sqlplus(
    oracle_home: &Path,
    global_home: Option<&str>,
    node: ExecutionNode,
) -> Result<(PathBuf, SqlPlusSource), ConfigurationError> {
    let exe = sqlplus_executable_name();
    let bin_dir = oracle_home.join(BIN_DIR);
    if find_file(exe, &bin_dir) {
        return Ok((bin_dir.join(exe), SqlPlusSource::OracleHomeBin));
    }
    if find_file(exe, oracle_home) {
        return Ok((oracle_home.join(exe), SqlPlusSource::OracleHome));
    }
    if node.is_worker() {
        let base = non_empty(global_home)
            .map(PathBuf::from)
            .unwrap_or_else(|| oracle_home.to_path_buf());
        return Ok((base.join(BIN_DIR).join(exe), SqlPlusSource::WorkerFallback));
    }
    Err(ConfigurationError::SqlPlusNotFound(oracle_home.to_path_buf()))
}

pub fn resolve_sqlplus(
    oracle_home: &Path,
    homes: &HomeOverrides,
    settings: &GlobalSettings,
    node: ExecutionNode,
) -> Result<(PathBuf, SqlPlusSource), ConfigurationError> {
    match sqlplus_override(homes, settings) {
        Some(found) => Ok(found),
        None => locate_sqlplus(oracle_home, settings.oracle_home.as_deref(), node),
    }
}

/// Find the directory holding `tnsnames.ora`; `network/admin` wins over the
/// home root.
pub fn resolve_tns_admin(
    oracle_home: &Path,
    homes: &HomeOverrides,
    settings: &GlobalSettings,
    node: ExecutionNode,
) -> Result<(PathBuf, TnsAdminSource), ConfigurationError> {
    if let Some(custom) = non_empty(homes.custom_tns_admin.as_deref()) {
        return Ok((PathBuf::from(custom), TnsAdminSource::Custom));
    }
    if let Some(global) = non_empty(settings.tns_admin.as_deref()) {
        return Ok((PathBuf::from(global), TnsAdminSource::Global));
    }
    if node.is_worker() {
        return Ok((oracle_home.to_path_buf(), TnsAdminSource::WorkerDefault));
    }
    let network_admin = oracle_home.join("network").join("admin");
    if find_file(TNSNAMES_ORA, &network_admin) {
        return Ok((network_admin, TnsAdminSource::NetworkAdmin));
    }
    if find_file(TNSNAMES_ORA, oracle_home) {
        return Ok((oracle_home.to_path_buf(), TnsAdminSource::OracleHome));
    }
    Err(ConfigurationError::TnsNamesNotFound(oracle_home.to_path_buf()))
}

/// `{home}/lib` and `{home}` joined with the platform list separator.
pub fn library_path(oracle_home: &Path) -> String {
    format!(
        "{}{}{}",
        oracle_home.join(LIB_DIR).display(),
        path_list_separator(),
        oracle_home.display()
    )
}

/// Variables the child needs on top of the inherited environment.
pub fn child_env(oracle_home: &Path, tns_admin: Option<&Path>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(
        ENV_ORACLE_HOME.to_string(),
        oracle_home.display().to_string(),
    );
    env.insert(ENV_LD_LIBRARY_PATH.to_string(), library_path(oracle_home));
    if let Some(tns_admin) = tns_admin {
        env.insert(ENV_TNS_ADMIN.to_string(), tns_admin.display().to_string());
    }
    env
}

/// Run every resolution rule in order and assemble the child environment.
pub fn resolve_environment(
    homes: &HomeOverrides,
    settings: &GlobalSettings,
    env: &EnvSnapshot,
    node: ExecutionNode,
    workspace: &Path,
) -> Result<ResolvedEnvironment, ConfigurationError> {
    let selected = select_oracle_home(homes, settings, env);
    let has_override = sqlplus_override(homes, settings).is_some();
    let oracle_home = validate_oracle_home(&selected, has_override, node)?;
    let (tns_admin, tns_admin_source) = resolve_tns_admin(&oracle_home, homes, settings, node)?;
    let (sqlplus, sqlplus_source) = resolve_sqlplus(&oracle_home, homes, settings, node)?;
    let working_dir = match tns_admin_source {
        TnsAdminSource::OracleHome => oracle_home.clone(),
        _ => workspace.to_path_buf(),
    };
    let env = child_env(&oracle_home, Some(&tns_admin));
    Ok(ResolvedEnvironment {
        oracle_home,
        home_source: selected.source,
        sqlplus,
        sqlplus_source,
        tns_admin,
        tns_admin_source,
        working_dir,
        env,
    })
}
