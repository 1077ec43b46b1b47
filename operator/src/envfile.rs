//! Idempotent upsert of `KEY=value` entries into the persisted env file.
//!
//! The calibration procedure is the only writer; reads happen once at
//! startup through the normal environment loading.

use std::io;
use std::path::Path;

use tracing::info;

/// Upsert each `(key, value)` pair: an existing key is replaced in place,
/// a new key is appended, and the file always ends with a newline.
pub fn upsert(path: &Path, entries: &[(&str, String)]) -> io::Result<()> {
    let mut lines: Vec<String> = match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };

    for (key, value) in entries {
        let prefix = format!("{key}=");
        match lines.iter_mut().find(|l| l.trim_start().starts_with(&prefix)) {
            Some(line) => *line = format!("{key}={value}"),
            None => lines.push(format!("{key}={value}")),
        }
    }

    std::fs::write(path, lines.join("\n") + "\n")?;
    info!("persisted {} entr(ies) to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_file_and_appends_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        upsert(&path, &[("X_OFFSET", "12".into()), ("Y_OFFSET", "-3".into())]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "X_OFFSET=12\nY_OFFSET=-3\n");
    }

    #[test]
    fn replaces_existing_keys_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "GOOGLE_API_KEY_1=abc\nX_OFFSET=5\nY_OFFSET=9\n").unwrap();

        upsert(&path, &[("X_OFFSET", "-2".into())]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "GOOGLE_API_KEY_1=abc\nX_OFFSET=-2\nY_OFFSET=9\n");
    }

    #[test]
    fn upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        for _ in 0..3 {
            upsert(&path, &[("X_OFFSET", "7".into())]).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "X_OFFSET=7\n");
    }

    #[test]
    fn trailing_newline_is_guaranteed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        // Seed a file with no trailing newline.
        std::fs::write(&path, "A=1").unwrap();

        upsert(&path, &[("B", "2".into())]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        assert_eq!(contents, "A=1\nB=2\n");
    }
}
