//! Database credentials and the file-backed credential store.
use crate::error::ConfigurationError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const CREDENTIALS_SCHEMA_VERSION: u32 = 1;

/// Fixed-length mask printed in place of any password.
pub const HIDDEN_PASSWORD: &str = "********";

/// A password that never prints in clear text.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Clear text, for building the child's argv only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HIDDEN_PASSWORD)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HIDDEN_PASSWORD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password),
        }
    }

    /// `user/password[@instance]` as passed to SQL*Plus.
    pub fn connect_string(&self, instance: Option<&str>) -> String {
        join_connect(&self.username, self.password.expose(), instance)
    }

    /// Same shape as [`Credentials::connect_string`] with the password masked.
    pub fn masked_connect_string(&self, instance: Option<&str>) -> String {
        join_connect(&self.username, HIDDEN_PASSWORD, instance)
    }
}

fn join_connect(user: &str, password: &str, instance: Option<&str>) -> String {
    match instance {
        Some(instance) => format!("{user}/{password}@{instance}"),
        None => format!("{user}/{password}"),
    }
}

/// Username/password pairs keyed by credentials id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialStore {
    pub schema_version: u32,
    #[serde(default)]
    pub credentials: BTreeMap<String, Credentials>,
}

impl CredentialStore {
    pub fn empty() -> Self {
        Self {
            schema_version: CREDENTIALS_SCHEMA_VERSION,
            credentials: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read credentials {}", path.display()))?;
        let store: CredentialStore =
            serde_json::from_slice(&bytes).context("parse credentials JSON")?;
        if store.schema_version != CREDENTIALS_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported credentials schema_version {}",
                store.schema_version
            ));
        }
        Ok(store)
    }

    pub fn resolve(&self, id: &str) -> Result<Credentials, ConfigurationError> {
        self.credentials
            .get(id)
            .filter(|creds| !creds.username.trim().is_empty())
            .cloned()
            .ok_or_else(|| ConfigurationError::InvalidCredentials(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_formats_clear_text() {
        let creds = Credentials::new("scott", "tiger");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("tiger"));
        assert!(debug.contains(HIDDEN_PASSWORD));
        assert_eq!(creds.password.to_string(), HIDDEN_PASSWORD);
    }

    #[test]
    fn connect_strings() {
        let creds = Credentials::new("scott", "tiger");
        assert_eq!(creds.connect_string(None), "scott/tiger");
        assert_eq!(creds.connect_string(Some("orcl")), "scott/tiger@orcl");
        assert_eq!(
            creds.masked_connect_string(Some("orcl")),
            "scott/********@orcl"
        );
    }

    #[test]
    fn store_resolves_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"{"schema_version":1,"credentials":{"db":{"username":"scott","password":"tiger"}}}"#,
        )
        .expect("write store");

        let store = CredentialStore::load(&path).expect("load store");
        let creds = store.resolve("db").expect("resolve");
        assert_eq!(creds.username, "scott");
        assert_eq!(creds.password.expose(), "tiger");

        let err = store.resolve("other").expect_err("unknown id");
        assert!(matches!(err, ConfigurationError::InvalidCredentials(id) if id == "other"));
    }

    #[test]
    fn store_rejects_unknown_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"schema_version":9}"#).expect("write store");
        assert!(CredentialStore::load(&path).is_err());
    }
}
