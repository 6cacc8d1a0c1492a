use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

pub fn now_epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis()
}

/// Replace `dest` with `bytes` via a hidden sibling temp file and a rename.
///
/// Readers observe either the previous contents or the new contents. An
/// existing file keeps its permissions.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, bytes).with_context(|| format!("write {}", tmp_path.display()))?;
    if let Err(err) = keep_permissions(dest, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("replace {}", dest.display()));
    }
    Ok(())
}

fn keep_permissions(dest: &Path, staged: &Path) -> Result<()> {
    let permissions = match fs::metadata(dest) {
        Ok(metadata) => metadata.permissions(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("stat {}", dest.display())),
    };
    fs::set_permissions(staged, permissions)
        .with_context(|| format!("set permissions on {}", staged.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("héllo", 2), "h");
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dest = dir.path().join("nested").join("config.json");
        write_atomic(&dest, b"{}").expect("first write");
        write_atomic(&dest, b"{\"a\":1}").expect("second write");
        assert_eq!(fs::read_to_string(&dest).expect("read"), "{\"a\":1}");
        let leftovers: Vec<_> = fs::read_dir(dest.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let dest = dir.path().join("config.json");
        fs::write(&dest, "{}").expect("seed");
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o600)).expect("chmod");

        write_atomic(&dest, b"{\"k\":\"secret\"}").expect("rewrite");

        let mode = fs::metadata(&dest).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&dest).expect("read"), "{\"k\":\"secret\"}");
    }
}
