//! Run configuration and the persisted global settings.
//!
//! Global settings stand in for the host's configuration store: they are
//! loaded once and passed explicitly into every run.
use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;
pub const SETTINGS_ENV: &str = "SQLPLUS_RUNNER_SETTINGS";
const SETTINGS_DIR_NAME: &str = "sqlplus-runner";

/// Tag for the two script sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "file")]
    FileReference,
    #[serde(rename = "userDefined")]
    UserDefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Path relative to the workspace.
    FileReference(PathBuf),
    /// Inline script body.
    UserDefined(String),
}

impl ScriptSource {
    pub fn script_type(&self) -> ScriptType {
        match self {
            ScriptSource::FileReference(_) => ScriptType::FileReference,
            ScriptSource::UserDefined(_) => ScriptType::UserDefined,
        }
    }

    pub(crate) fn is_blank(&self) -> bool {
        match self {
            ScriptSource::FileReference(path) => path.as_os_str().is_empty(),
            ScriptSource::UserDefined(body) => body.trim().is_empty(),
        }
    }
}

/// Per-step overrides. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeOverrides {
    pub custom_oracle_home: Option<String>,
    pub custom_sqlplus_home: Option<String>,
    pub custom_tns_admin: Option<String>,
}

/// Persisted global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    pub schema_version: u32,
    #[serde(default)]
    pub oracle_home: Option<String>,
    #[serde(default)]
    pub sqlplus_home: Option<String>,
    #[serde(default)]
    pub tns_admin: Option<String>,
    #[serde(default)]
    pub hide_sqlplus_version: bool,
    #[serde(default = "default_true")]
    pub try_to_detect_oracle_home: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            oracle_home: None,
            sqlplus_home: None,
            tns_admin: None,
            hide_sqlplus_version: false,
            try_to_detect_oracle_home: true,
            debug: false,
        }
    }
}

/// Everything one run needs. Never mutated once built.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub credentials: Credentials,
    pub instance: Option<String>,
    pub script: ScriptSource,
    pub homes: HomeOverrides,
    pub settings: GlobalSettings,
}

impl RunConfiguration {
    pub fn debug(&self) -> bool {
        self.settings.debug
    }
}

/// Return the trimmed value when it is non-empty.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Locations of the settings file and the credential store.
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    root: PathBuf,
}

impl SettingsPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the settings directory: explicit flag, then `SQLPLUS_RUNNER_SETTINGS`,
    /// then the platform config dir.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        let config_dir = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("cannot determine config directory"))?;
        Ok(Self::new(config_dir.join(SETTINGS_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.root.join("credentials.json")
    }
}

pub fn settings_stub() -> Result<String> {
    serde_json::to_string_pretty(&GlobalSettings::default()).context("serialize settings stub")
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_settings(paths: &SettingsPaths) -> Result<GlobalSettings> {
    let path = paths.settings_path();
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "settings file absent, using defaults");
        return Ok(GlobalSettings::default());
    }
    let bytes = fs::read(&path).with_context(|| format!("read settings {}", path.display()))?;
    let settings: GlobalSettings =
        serde_json::from_slice(&bytes).context("parse settings JSON")?;
    validate_settings(&settings)?;
    Ok(settings)
}

pub fn validate_settings(settings: &GlobalSettings) -> Result<()> {
    if settings.schema_version != SETTINGS_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported settings schema_version {}",
            settings.schema_version
        ));
    }
    for (field, value) in [
        ("oracle_home", &settings.oracle_home),
        ("sqlplus_home", &settings.sqlplus_home),
        ("tns_admin", &settings.tns_admin),
    ] {
        if value.as_deref().is_some_and(|v| v.contains('\0')) {
            return Err(anyhow!("{field} contains NUL"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_round_trips_through_loader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SettingsPaths::new(dir.path().to_path_buf());
        fs::write(paths.settings_path(), settings_stub().expect("stub")).expect("write stub");
        let settings = load_settings(&paths).expect("load settings");
        assert_eq!(settings, GlobalSettings::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = SettingsPaths::new(dir.path().join("absent"));
        let settings = load_settings(&paths).expect("load settings");
        assert!(settings.try_to_detect_oracle_home);
        assert!(settings.oracle_home.is_none());
    }

    #[test]
    fn detection_defaults_on_when_key_is_absent() {
        let settings: GlobalSettings =
            serde_json::from_str(r#"{"schema_version":1,"oracle_home":"/opt/oracle"}"#)
                .expect("parse");
        assert!(settings.try_to_detect_oracle_home);
        assert_eq!(settings.oracle_home.as_deref(), Some("/opt/oracle"));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let settings = GlobalSettings {
            schema_version: 7,
            ..GlobalSettings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn script_type_serializes_with_legacy_names() {
        assert_eq!(
            serde_json::to_string(&ScriptType::UserDefined).expect("serialize"),
            "\"userDefined\""
        );
        assert_eq!(
            serde_json::to_string(&ScriptType::FileReference).expect("serialize"),
            "\"file\""
        );
    }

    #[test]
    fn non_empty_trims() {
        assert_eq!(non_empty(Some(" /opt/oracle ")), Some("/opt/oracle"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
