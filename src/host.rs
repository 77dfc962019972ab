//! Host detection helpers.
use serde::Serialize;

pub const SQLPLUS: &str = "sqlplus";
pub const SQLPLUS_FOR_WINDOWS: &str = "sqlplus.exe";

/// Where the run executes relative to the filesystem this process can see.
///
/// On a worker, paths refer to the remote node, so local existence checks
/// are skipped rather than trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionNode {
    Controller,
    Worker,
}

impl ExecutionNode {
    pub fn is_worker(self) -> bool {
        matches!(self, ExecutionNode::Worker)
    }
}

pub fn is_windows() -> bool {
    cfg!(windows)
}

pub fn sqlplus_executable_name() -> &'static str {
    if is_windows() {
        SQLPLUS_FOR_WINDOWS
    } else {
        SQLPLUS
    }
}

pub fn path_list_separator() -> char {
    if is_windows() {
        ';'
    } else {
        ':'
    }
}

/// Best-effort host name for diagnostics; falls back to `localhost`.
pub fn host_name() -> String {
    platform_host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(unix)]
fn platform_host_name() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes and gethostname NUL-terminates
    // on success when the name fits.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[cfg(not(unix))]
fn platform_host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}
