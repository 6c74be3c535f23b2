//! Process-tree discovery and termination.
//!
//! A [`Snapshot`] is a point-in-time view of the OS process table, rebuilt
//! on every termination request. Processes forked after the snapshot was
//! taken are not caught.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProcessTreeError {
    /// The process table could not be read.
    #[error("Cannot get processes: {0}")]
    Snapshot(String),
}

/// Point-in-time mapping from pid to parent pid.
///
/// Zombies are excluded: they are already dead and signaling them is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    parents: HashMap<u32, u32>,
    children: HashMap<u32, Vec<u32>>,
}

impl Snapshot {
    /// Build a snapshot from `(pid, parent pid)` pairs.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut snapshot = Snapshot::default();
        for (pid, ppid) in entries {
            snapshot.parents.insert(pid, ppid);
            snapshot.children.entry(ppid).or_default().push(pid);
        }
        snapshot
    }

    /// Read the live process table.
    pub fn capture() -> Result<Self, ProcessTreeError> {
        platform::live_processes().map(Self::from_entries)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.parents.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// `root` (if live) and every live descendant, breadth-first.
    pub fn subtree(&self, root: u32) -> Vec<u32> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([root]);
        if self.contains(root) {
            found.push(root);
        }

        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            if let Some(children) = self.children.get(&pid) {
                for &child in children {
                    // pid 0 on some platforms lists itself as its own parent
                    if !seen.insert(child) {
                        continue;
                    }
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        found
    }
}

/// Kill `root` and every process descending from it with `SIGKILL`.
///
/// Returns the number of processes signaled. Already-dead processes count
/// as zero additional work. The calling process is never signaled, even
/// when it is part of the subtree.
pub fn terminate_tree(root: u32) -> Result<usize, ProcessTreeError> {
    let snapshot = Snapshot::capture()?;
    let own_pid = std::process::id();

    let mut terminated = 0;
    for pid in snapshot.subtree(root) {
        if pid == own_pid {
            continue;
        }
        if force_kill(pid) {
            terminated += 1;
        }
    }

    debug!(root, terminated, "process tree terminated");
    Ok(terminated)
}

/// True when `pid` is a live, non-zombie process.
pub fn is_alive(pid: u32) -> Result<bool, ProcessTreeError> {
    Snapshot::capture().map(|snapshot| snapshot.contains(pid))
}

fn force_kill(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(errno) => {
            warn!(pid, %errno, "failed to kill process");
            false
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::ProcessTreeError;

    pub(super) fn live_processes() -> Result<Vec<(u32, u32)>, ProcessTreeError> {
        let entries = std::fs::read_dir("/proc")
            .map_err(|e| ProcessTreeError::Snapshot(format!("/proc: {e}")))?;

        let mut processes = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // The process may exit between listing and reading; skip it.
            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some((state, ppid)) = parse_stat(&stat) {
                if state != 'Z' && state != 'X' {
                    processes.push((pid, ppid));
                }
            }
        }
        Ok(processes)
    }

    /// Parse `(state, ppid)` out of `/proc/<pid>/stat`.
    ///
    /// The command name is parenthesized and may itself contain spaces or
    /// parentheses, so fields are counted from the last `)`.
    pub(super) fn parse_stat(stat: &str) -> Option<(char, u32)> {
        let rest = &stat[stat.rfind(')')? + 1..];
        let mut fields = rest.split_whitespace();
        let state = fields.next()?.chars().next()?;
        let ppid = fields.next()?.parse().ok()?;
        Some((state, ppid))
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::ProcessTreeError;
    use std::process::Command;

    pub(super) fn live_processes() -> Result<Vec<(u32, u32)>, ProcessTreeError> {
        let output = Command::new("ps")
            .args(["-A", "-o", "pid=", "-o", "ppid=", "-o", "stat="])
            .output()
            .map_err(|e| ProcessTreeError::Snapshot(format!("ps: {e}")))?;
        if !output.status.success() {
            return Err(ProcessTreeError::Snapshot(format!(
                "ps exited with {}",
                output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let processes = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let pid = fields.next()?.parse().ok()?;
                let ppid = fields.next()?.parse().ok()?;
                let stat = fields.next().unwrap_or("");
                (!stat.starts_with('Z')).then_some((pid, ppid))
            })
            .collect();
        Ok(processes)
    }
}
