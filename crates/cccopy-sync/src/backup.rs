//! Rotating per-file backups for uploads
//!
//! When a project configures `BACKUP_COUNT`, every file about to be
//! overwritten in Production is first copied into a `backup/` directory
//! next to it, named `<file>_cccopy_<index>_<epoch_secs>`. Indexes grow
//! monotonically; the oldest backups are deleted to honor the limit.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use cccopy_types::Result;

const BACKUP_DIR: &str = "backup";
const BACKUP_TAG: &str = "_cccopy_";

/// Create a rotating backup of `production_file` before it is replaced.
///
/// Returns the backup path, or `None` when backups are disabled or the
/// file does not exist yet. Rotation failures on individual stale backups
/// are logged and skipped.
pub fn create_backup(production_file: &Path, backup_count: u32) -> Result<Option<PathBuf>> {
    if backup_count == 0 || !production_file.is_file() {
        return Ok(None);
    }
    let Some(parent) = production_file.parent() else {
        return Ok(None);
    };
    let Some(file_name) = production_file.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };

    let backup_dir = parent.join(BACKUP_DIR);
    std::fs::create_dir_all(&backup_dir)?;

    let mut existing = list_backups(&backup_dir, file_name);
    existing.sort_by_key(|(index, _)| *index);

    // Make room for the new backup.
    while existing.len() as u32 >= backup_count {
        let (_, stale) = existing.remove(0);
        if let Err(e) = std::fs::remove_file(&stale) {
            warn!(path = %stale.display(), error = %e, "Failed to remove stale backup");
        }
    }

    let next_index = existing.last().map_or(0, |(index, _)| index + 1);
    let epoch_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let backup_path = backup_dir.join(format!(
        "{file_name}{BACKUP_TAG}{next_index:06}_{epoch_secs}"
    ));

    std::fs::copy(production_file, &backup_path)?;
    debug!(backup = %backup_path.display(), "Backup created");
    Ok(Some(backup_path))
}

fn list_backups(backup_dir: &Path, file_name: &str) -> Vec<(u64, PathBuf)> {
    let prefix = format!("{file_name}{BACKUP_TAG}");
    let Ok(entries) = std::fs::read_dir(backup_dir) else {
        return Vec::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_str()?;
            let rest = name.strip_prefix(&prefix)?;
            let index = rest.split('_').next()?.parse::<u64>().ok()?;
            path.is_file().then_some((index, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_backups_do_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(create_backup(&file, 0).unwrap(), None);
        assert!(!dir.path().join("backup").exists());
    }

    #[test]
    fn test_missing_file_is_not_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(create_backup(&dir.path().join("nope"), 3).unwrap(), None);
    }

    #[test]
    fn test_backup_preserves_content_and_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");

        let mut created = Vec::new();
        for round in 0..4 {
            std::fs::write(&file, format!("v{round}")).unwrap();
            created.push(create_backup(&file, 2).unwrap().unwrap());
        }

        let remaining: Vec<PathBuf> = list_backups(&dir.path().join("backup"), "a.txt")
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(remaining.len(), 2);
        // Only the two newest survive the rotation.
        assert!(remaining.contains(&created[2]));
        assert!(remaining.contains(&created[3]));
        assert_eq!(std::fs::read_to_string(&created[3]).unwrap(), "v3");
    }

    #[test]
    fn test_indexes_grow_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let first = create_backup(&file, 5).unwrap().unwrap();
        let second = create_backup(&file, 5).unwrap().unwrap();
        let index_of = |p: &PathBuf| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("a.txt_cccopy_"))
                .and_then(|rest| rest.split('_').next())
                .and_then(|i| i.parse::<u64>().ok())
                .unwrap()
        };
        assert_eq!(index_of(&first), 0);
        assert_eq!(index_of(&second), 1);
    }
}
