//! [`DirSync`] backed by the `rsync` binary.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use super::{DirSync, SyncState};
use crate::utils::{BackupError, Result};

pub struct RsyncSync {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl RsyncSync {
    pub fn new(binary: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    /// Arguments for one transfer. Directories get a trailing `/` on both
    /// sides so their contents land directly in `destination`.
    fn args(&self, source: &Path, destination: &Path, source_is_dir: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-a".into(), "--info=progress2".into()];
        args.extend(self.extra_args.iter().map(OsString::from));

        let mut src = source.as_os_str().to_os_string();
        let mut dst = destination.as_os_str().to_os_string();
        if source_is_dir {
            src.push("/");
            dst.push("/");
        }
        args.push(src);
        args.push(dst);
        args
    }
}

#[async_trait]
impl DirSync for RsyncSync {
    async fn sync(
        &self,
        source: &Path,
        destination: &Path,
        state: &watch::Sender<SyncState>,
    ) -> Result<()> {
        let source_is_dir = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let args = self.args(source, destination, source_is_dir);
        debug!("Running {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackupError::Sync(format!("failed to run {}: {}", self.binary.display(), e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackupError::Sync("rsync stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackupError::Sync("rsync stderr unavailable".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            let _ = stderr.read_to_string(&mut output).await;
            output
        });

        // progress2 redraws its line with '\r'
        let mut buf = [0u8; 4096];
        let mut line = Vec::new();
        loop {
            let n = stdout.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                if byte == b'\r' || byte == b'\n' {
                    publish_line(&line, state);
                    line.clear();
                } else {
                    line.push(byte);
                }
            }
        }
        publish_line(&line, state);

        let status = child.wait().await?;
        let errors = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(BackupError::Sync(format!(
                "rsync {} -> {} exited with {}: {}",
                source.display(),
                destination.display(),
                status,
                errors.trim()
            )));
        }

        state.send_modify(|s| s.progress = 100.0);
        Ok(())
    }
}

fn publish_line(line: &[u8], state: &watch::Sender<SyncState>) {
    if line.is_empty() {
        return;
    }
    let current = *state.borrow();
    if let Some(update) = parse_progress_line(&String::from_utf8_lossy(line), current) {
        state.send_replace(update);
    }
}

/// Parse an `--info=progress2` line such as
/// `  1,234,567  45%   10.00MB/s    0:00:01 (xfr#3, to-chk=12/20)`.
///
/// Fields missing from the line keep their `previous` value. Lines without
/// any progress field yield `None`.
pub fn parse_progress_line(line: &str, previous: SyncState) -> Option<SyncState> {
    let mut state = previous;
    let mut found = false;

    for token in line.split_whitespace() {
        if let Some(percent) = token.strip_suffix('%') {
            if let Ok(value) = percent.parse::<f64>() {
                state.progress = value;
                found = true;
            }
            continue;
        }

        let counts = token
            .trim_end_matches(')')
            .strip_prefix("to-chk=")
            .or_else(|| token.trim_end_matches(')').strip_prefix("ir-chk="));
        if let Some((remain, total)) = counts.and_then(|c| c.split_once('/')) {
            if let (Ok(remain), Ok(total)) = (remain.parse(), total.parse()) {
                state.remain = remain;
                state.total = total;
                found = true;
            }
        }
    }

    found.then_some(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let state = parse_progress_line(
            "      1,234,567  45%   10.00MB/s    0:00:01 (xfr#3, to-chk=12/20)",
            SyncState::default(),
        )
        .unwrap();
        assert_eq!(state.progress, 45.0);
        assert_eq!(state.remain, 12);
        assert_eq!(state.total, 20);
    }

    #[test]
    fn test_parse_incremental_recursion_line() {
        let state = parse_progress_line(
            "        32,768   3%   31.25MB/s    0:00:00 (xfr#1, ir-chk=1009/1012)",
            SyncState::default(),
        )
        .unwrap();
        assert_eq!(state.progress, 3.0);
        assert_eq!(state.remain, 1009);
        assert_eq!(state.total, 1012);
    }

    #[test]
    fn test_parse_keeps_previous_counts() {
        let previous = SyncState {
            progress: 10.0,
            remain: 4,
            total: 9,
        };
        let state = parse_progress_line("  2,048  67%  1.00MB/s  0:00:02", previous).unwrap();
        assert_eq!(state.progress, 67.0);
        assert_eq!(state.remain, 4);
        assert_eq!(state.total, 9);
    }

    #[test]
    fn test_parse_ignores_other_output() {
        assert!(parse_progress_line("sending incremental file list", SyncState::default()).is_none());
        assert!(parse_progress_line("", SyncState::default()).is_none());
    }

    #[test]
    fn test_args_for_directory() {
        let rsync = RsyncSync::new("rsync", vec!["--delete".to_string()]);
        let args = rsync.args(Path::new("/b/src"), Path::new("/new/dst"), true);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-a", "--info=progress2", "--delete", "/b/src/", "/new/dst/"]);

        let args = rsync.args(Path::new("/b/file"), Path::new("/new/file"), false);
        assert_eq!(args.last().unwrap(), "/new/file");
    }

    #[tokio::test]
    async fn test_missing_binary_is_sync_error() {
        let rsync = RsyncSync::new("/nonexistent/bin/rsync", Vec::new());
        let (tx, _rx) = watch::channel(SyncState::default());
        let dir = tempfile::TempDir::new().unwrap();
        let result = rsync.sync(dir.path(), &dir.path().join("out"), &tx).await;
        assert!(matches!(result, Err(BackupError::Sync(_))));
    }
}
