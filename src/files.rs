//! Script file inspection and preparation.
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempPath;

pub const SQLPLUS_EXIT: &str = "exit;";
const MIN_ELIGIBLE_LINE_LEN: usize = 5;
const TEMP_SCRIPT_PREFIX: &str = "temp-script-";
const TEMP_SCRIPT_SUFFIX: &str = ".sql";

/// True when the last line of at least five characters is `exit;`
/// (trimmed, any case). Earlier lines are not considered.
pub fn content_has_exit_directive(text: &str) -> bool {
    last_eligible_line(text.lines().map(str::to_string))
}

/// Same check on raw file bytes. Bytes that are not UTF-8 decode to
/// replacement characters, so scripts in legacy encodings are still read.
pub fn bytes_have_exit_directive(bytes: &[u8]) -> bool {
    content_has_exit_directive(&String::from_utf8_lossy(bytes))
}

pub fn has_exit_directive(path: &Path) -> io::Result<bool> {
    Ok(bytes_have_exit_directive(&fs::read(path)?))
}

fn last_eligible_line(lines: impl Iterator<Item = String>) -> bool {
    lines
        .filter(|line| line.chars().count() >= MIN_ELIGIBLE_LINE_LEN)
        .last()
        .is_some_and(|line| line.trim().eq_ignore_ascii_case(SQLPLUS_EXIT))
}

/// Text to append so `text` ends with an exit directive.
fn exit_suffix(text_ends_with_newline: bool, empty: bool) -> String {
    if empty || text_ends_with_newline {
        format!("{SQLPLUS_EXIT}\n")
    } else {
        format!("\n{SQLPLUS_EXIT}\n")
    }
}

/// Append an exit directive in place when the file lacks one.
/// Returns whether the file was modified.
pub fn ensure_exit_directive(path: &Path) -> io::Result<bool> {
    let existing = fs::read(path)?;
    if bytes_have_exit_directive(&existing) {
        return Ok(false);
    }
    let suffix = exit_suffix(existing.ends_with(b"\n"), existing.is_empty());
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(suffix.as_bytes())?;
    file.flush()?;
    Ok(true)
}

/// Inline body with an exit directive appended when missing.
pub fn with_exit_directive(body: &str) -> String {
    if content_has_exit_directive(body) {
        return body.to_string();
    }
    let mut out = body.to_string();
    out.push_str(&exit_suffix(body.ends_with('\n'), body.is_empty()));
    out
}

/// Write an inline script to a fresh `temp-script-*.sql` file in `dir`.
///
/// The returned path deletes the file when dropped; callers that want to
/// observe deletion failures should call [`TempPath::close`].
pub fn create_temp_script(dir: &Path, body: &str) -> io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_SCRIPT_PREFIX)
        .suffix(TEMP_SCRIPT_SUFFIX)
        .tempfile_in(dir)?;
    file.write_all(with_exit_directive(body).as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Whether `dir` directly contains a regular file named `name`, compared
/// case-insensitively. Unreadable or missing directories yield `false`.
pub fn find_file(name: &str, dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(Result::ok).any(|entry| {
        entry.file_type().is_ok_and(|ty| !ty.is_dir())
            && entry
                .file_name()
                .to_str()
                .is_some_and(|file_name| file_name.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_trailing_exit_case_insensitively() {
        assert!(content_has_exit_directive("select 1 from dual;\nEXIT;\n"));
        assert!(content_has_exit_directive("select 1 from dual;\n   exit;   \n"));
        assert!(!content_has_exit_directive("select 1 from dual;\n"));
        assert!(!content_has_exit_directive(""));
    }

    #[test]
    fn short_lines_are_ignored() {
        // "/" and blank lines are below the eligibility threshold.
        assert!(content_has_exit_directive("exit;\n/\n\n"));
        assert!(!content_has_exit_directive("exit;\nselect 1 from dual;\n/\n"));
    }

    #[test]
    fn only_last_eligible_line_counts() {
        assert!(!content_has_exit_directive("exit;\nselect 1 from dual;"));
    }

    #[test]
    fn appends_exit_to_workspace_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.sql");
        fs::write(&path, "SELECT 1 FROM DUAL;").expect("write script");

        assert!(!has_exit_directive(&path).expect("read"));
        assert!(ensure_exit_directive(&path).expect("append"));
        assert!(has_exit_directive(&path).expect("read"));
        assert!(!ensure_exit_directive(&path).expect("second pass"));

        let content = fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "SELECT 1 FROM DUAL;\nexit;\n");
    }

    #[test]
    fn latin1_script_gets_exit_appended() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("latin1.sql");
        let original = b"-- migra\xe7\xe3o\nSELECT 1 FROM DUAL;\n".to_vec();
        fs::write(&path, &original).expect("write script");

        assert!(!has_exit_directive(&path).expect("read latin1"));
        assert!(ensure_exit_directive(&path).expect("append"));
        assert!(!ensure_exit_directive(&path).expect("second pass"));

        let mut expected = original;
        expected.extend_from_slice(b"exit;\n");
        assert_eq!(fs::read(&path).expect("read back"), expected);
    }

    #[test]
    fn latin1_exit_line_is_detected() {
        assert!(bytes_have_exit_directive(b"-- \xe9t\xe9\nEXIT;\n"));
    }

    #[test]
    fn file_with_exit_is_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("b.sql");
        fs::write(&path, "select 1 from dual;\nexit;\n").expect("write script");
        assert!(!ensure_exit_directive(&path).expect("check"));
        assert_eq!(
            fs::read_to_string(&path).expect("read back"),
            "select 1 from dual;\nexit;\n"
        );
    }

    #[test]
    fn temp_script_ends_with_exit_and_is_removed_on_close() {
        let dir = tempfile::tempdir().expect("tempdir");
        let temp = create_temp_script(dir.path(), "select * from v$version;\n").expect("create");
        let path = temp.to_path_buf();
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("temp-script-"));
        assert!(name.ends_with(".sql"));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "select * from v$version;\nexit;\n"
        );
        temp.close().expect("delete temp script");
        assert!(!path.exists());
    }

    #[test]
    fn with_exit_directive_is_idempotent() {
        let once = with_exit_directive("select 1 from dual;");
        assert_eq!(with_exit_directive(&once), once);
    }

    #[test]
    fn find_file_matches_direct_children_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("network/admin")).expect("mkdir");
        fs::write(dir.path().join("network/admin/tnsnames.ora"), "").expect("write");
        fs::write(dir.path().join("SQLPLUS"), "").expect("write");

        assert!(find_file("sqlplus", dir.path()));
        assert!(!find_file("tnsnames.ora", dir.path()));
        assert!(find_file("TNSNAMES.ORA", &dir.path().join("network/admin")));
        assert!(!find_file("network", dir.path()));
        assert!(!find_file("tnsnames.ora", &dir.path().join("missing")));
    }
}
