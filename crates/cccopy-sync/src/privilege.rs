//! Audited privilege elevation for Production writes
//!
//! Writes into the shared Production tree require membership in the
//! project's upload group. A [`PrivilegeScope`] switches the effective gid
//! for the duration of a guard and restores it on every exit path. Both
//! transitions are appended to an audit log before the switch happens.
//!
//! Restoration failure is fatal: continuing with an elevated effective gid
//! is never acceptable, so the process aborts.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use nix::unistd::{getegid, setegid, Gid, Group};
use tracing::{debug, error, info};

use cccopy_types::{Error, Result};

/// Factory for privilege guards over one audit log.
#[derive(Debug, Clone)]
pub struct PrivilegeScope {
    group: Option<String>,
    audit_path: PathBuf,
}

impl PrivilegeScope {
    /// Create a scope for the configured upload group. `None` disables
    /// elevation entirely (single-group deployments).
    pub fn new(group: Option<String>, audit_path: impl Into<PathBuf>) -> Self {
        Self {
            group,
            audit_path: audit_path.into(),
        }
    }

    /// Audit log location.
    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    /// Enter the elevated scope for `reason`.
    ///
    /// Resolves the group, appends the entry audit line, switches the
    /// effective gid and returns the guard. With no group configured the
    /// guard is a recorded no-op.
    pub fn enter(&self, reason: &str) -> Result<PrivilegeGuard> {
        let Some(group_name) = self.group.as_deref() else {
            debug!("No upload group configured, skipping elevation");
            return Ok(PrivilegeGuard {
                previous: None,
                audit_path: self.audit_path.clone(),
                entered_at: Instant::now(),
                released: false,
            });
        };

        let group = Group::from_name(group_name)
            .map_err(|e| Error::config(format!("group lookup failed for '{group_name}': {e}")))?
            .ok_or_else(|| Error::config(format!("unknown group '{group_name}'")))?;

        let previous = getegid();
        self.append_audit(&format!(
            "{{\"event\":\"enter\",\"actor\":\"{}\",\"target_group\":\"{}\",\"reason\":\"{}\",\"ts_enter\":{}}}",
            whoami::username(),
            group_name,
            reason,
            epoch_ms(),
        ))?;

        setegid(group.gid).map_err(|e| {
            Error::config(format!(
                "cannot switch effective group to '{group_name}' (gid {}): {e}",
                group.gid
            ))
        })?;
        info!(group = group_name, gid = %group.gid, reason, "Privilege scope entered");

        Ok(PrivilegeGuard {
            previous: Some(previous),
            audit_path: self.audit_path.clone(),
            entered_at: Instant::now(),
            released: false,
        })
    }

    fn append_audit(&self, line: &str) -> Result<()> {
        append_line(&self.audit_path, line)
    }
}

/// Active elevation; restores the previous effective gid on exit.
#[derive(Debug)]
pub struct PrivilegeGuard {
    previous: Option<Gid>,
    audit_path: PathBuf,
    entered_at: Instant,
    released: bool,
}

impl PrivilegeGuard {
    /// Whether this guard actually switched the effective gid.
    pub fn is_elevated(&self) -> bool {
        self.previous.is_some()
    }

    /// Leave the scope, restoring the previous effective gid.
    pub fn leave(mut self) -> Result<()> {
        self.leave_inner();
        Ok(())
    }

    fn leave_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let Some(previous) = self.previous else {
            return;
        };
        if let Err(e) = setegid(previous) {
            // Aborting is the only safe option: every subsequent write
            // would otherwise run with the elevated group.
            error!(gid = %previous, error = %e, "FATAL: failed to restore effective group");
            let _ = append_line(
                &self.audit_path,
                &format!(
                    "{{\"event\":\"restore_failed\",\"gid\":{},\"ts\":{}}}",
                    previous, epoch_ms()
                ),
            );
            std::process::abort();
        }
        let duration_ms = self.entered_at.elapsed().as_millis();
        let _ = append_line(
            &self.audit_path,
            &format!(
                "{{\"event\":\"exit\",\"ts_exit\":{},\"duration_ms\":{duration_ms}}}",
                epoch_ms()
            ),
        );
        info!(duration_ms, "Privilege scope left");
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        self.leave_inner();
    }
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write per line so the OS serializes concurrent appenders.
    file.write_all(format!("{line}\n").as_bytes())?;
    Ok(())
}
