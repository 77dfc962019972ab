//! Case-insensitive environment snapshot and `$VAR` expansion.
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::OnceLock;

pub const ENV_ORACLE_HOME: &str = "ORACLE_HOME";
pub const ENV_LD_LIBRARY_PATH: &str = "LD_LIBRARY_PATH";
pub const ENV_TNS_ADMIN: &str = "TNS_ADMIN";

/// Environment variables keyed case-insensitively, keeping the spelling of
/// the last insert for display.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, (String, String)>,
}

impl EnvSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment. Names or values that are not
    /// valid Unicode are converted lossily rather than rejected.
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        vars.into_iter()
            .map(|(key, value)| {
                (
                    key.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.vars.insert(key.to_ascii_uppercase(), (key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(&key.to_ascii_uppercase())
            .map(|(_, value)| value.as_str())
    }

    /// Value of `key` when present and non-blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Expand `$NAME` and `${NAME}` references. Unknown names stay as written.
    pub fn expand(&self, text: &str) -> String {
        var_pattern()
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.get(name) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = EnvSnapshot::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern compiles")
    })
}
