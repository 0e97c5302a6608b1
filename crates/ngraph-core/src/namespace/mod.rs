//! Network namespace discovery.
//!
//! Walks the process table, resolves each process's network namespace, and
//! keeps one representative process per distinct namespace.

pub mod session;

use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use ngraph_common::constants::INIT_PID;
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{NamespaceHandle, NamespaceId};

/// Access to the host's processes and their network namespaces.
pub trait ProcessTable {
    /// Lists the ids of all live processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the process table cannot be listed at all.
    fn pids(&self) -> Result<Vec<i32>>;

    /// Resolves the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process has exited or its namespace link
    /// is not readable.
    fn netns_of(&self, pid: i32) -> Result<NamespaceHandle>;
}

/// Process table backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    /// Creates a process table rooted at `root` (normally `/proc`).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn netns_path(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string()).join("ns").join("net")
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(ngraph_common::constants::DEFAULT_PROC_ROOT)
    }
}

impl ProcessTable for ProcFs {
    fn pids(&self) -> Result<Vec<i32>> {
        let processes = procfs::process::all_processes_with_root(&self.root).map_err(|e| {
            NgraphError::ProcessTable {
                message: format!("{}: {e}", self.root.display()),
            }
        })?;
        // Processes that vanish while listing are not an error for the table.
        Ok(processes
            .filter_map(|p| match p {
                Ok(p) => Some(p.pid()),
                Err(e) => {
                    tracing::trace!(error = %e, "skipping process");
                    None
                }
            })
            .collect())
    }

    fn netns_of(&self, pid: i32) -> Result<NamespaceHandle> {
        let path = self.netns_path(pid);
        let metadata = std::fs::metadata(&path).map_err(|e| NgraphError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(NamespaceHandle {
            id: NamespaceId::new(metadata.ino()),
            pid,
            path,
        })
    }
}

/// Returns the distinct network namespaces to scan.
///
/// With `all_namespaces` unset, only the init process's namespace is
/// returned. Otherwise every process is visited and the first process seen
/// in each namespace becomes its representative. Processes whose namespace
/// cannot be resolved are skipped.
///
/// # Errors
///
/// Returns an error only if the process table itself cannot be listed.
pub fn enumerate_namespaces<T>(table: &T, all_namespaces: bool) -> Result<Vec<NamespaceHandle>>
where
    T: ProcessTable + ?Sized,
{
    if !all_namespaces {
        return match table.netns_of(INIT_PID) {
            Ok(handle) => Ok(vec![handle]),
            Err(e) => {
                tracing::warn!(pid = INIT_PID, error = %e, "cannot resolve init network namespace");
                Ok(Vec::new())
            }
        };
    }

    let pids = table.pids()?;
    let processes = pids.len();
    let mut seen = HashSet::new();
    let mut handles = Vec::new();
    for pid in pids {
        let handle = match table.netns_of(pid) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::trace!(pid, error = %e, "skipping process");
                continue;
            }
        };
        if seen.insert(handle.id) {
            tracing::trace!(pid, ns = %handle.id, "discovered network namespace");
            handles.push(handle);
        }
    }
    tracing::debug!(processes, namespaces = handles.len(), "enumerated namespaces");
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// In-memory process table: pid -> namespace inode, `None` for
    /// processes whose namespace cannot be read.
    struct FakeTable {
        procs: Vec<(i32, Option<u64>)>,
    }

    impl FakeTable {
        fn new(procs: &[(i32, Option<u64>)]) -> Self {
            Self {
                procs: procs.to_vec(),
            }
        }
    }

    impl ProcessTable for FakeTable {
        fn pids(&self) -> Result<Vec<i32>> {
            Ok(self.procs.iter().map(|(pid, _)| *pid).collect())
        }

        fn netns_of(&self, pid: i32) -> Result<NamespaceHandle> {
            let inode = self
                .procs
                .iter()
                .find(|(p, _)| *p == pid)
                .and_then(|(_, ino)| *ino)
                .ok_or_else(|| NgraphError::Io {
                    path: PathBuf::from(format!("/proc/{pid}/ns/net")),
                    source: std::io::ErrorKind::NotFound.into(),
                })?;
            Ok(NamespaceHandle {
                id: NamespaceId::new(inode),
                pid,
                path: PathBuf::from(format!("/proc/{pid}/ns/net")),
            })
        }
    }

    #[test]
    fn each_namespace_is_visited_once() {
        let table = FakeTable::new(&[
            (1, Some(100)),
            (2, Some(100)),
            (30, Some(200)),
            (31, Some(200)),
            (32, Some(300)),
            (40, Some(100)),
        ]);
        let handles = enumerate_namespaces(&table, true).expect("enumerate");
        assert_eq!(handles.len(), 3);

        let mut counts: HashMap<NamespaceId, usize> = HashMap::new();
        for h in &handles {
            *counts.entry(h.id).or_default() += 1;
        }
        assert!(counts.values().all(|&c| c == 1));
    }

    #[test]
    fn first_process_represents_its_namespace() {
        let table = FakeTable::new(&[(7, Some(200)), (1, Some(100)), (9, Some(200))]);
        let handles = enumerate_namespaces(&table, true).expect("enumerate");
        let rep = handles
            .iter()
            .find(|h| h.id == NamespaceId::new(200))
            .expect("namespace 200");
        assert_eq!(rep.pid, 7);
    }

    #[test]
    fn unresolvable_processes_are_skipped() {
        let table = FakeTable::new(&[(1, Some(100)), (2, None), (3, Some(300))]);
        let handles = enumerate_namespaces(&table, true).expect("enumerate");
        let ids: Vec<u64> = handles.iter().map(|h| h.id.inode()).collect();
        assert_eq!(ids, vec![100, 300]);
    }

    #[test]
    fn restricted_mode_returns_only_init_namespace() {
        let table = FakeTable::new(&[(1, Some(100)), (2, Some(200)), (3, Some(300))]);
        let handles = enumerate_namespaces(&table, false).expect("enumerate");
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].pid, 1);
        assert_eq!(handles[0].id, NamespaceId::new(100));
    }

    #[test]
    fn restricted_mode_without_init_is_empty() {
        let table = FakeTable::new(&[(1, None), (2, Some(200))]);
        let handles = enumerate_namespaces(&table, false).expect("enumerate");
        assert!(handles.is_empty());
    }

    #[test]
    fn procfs_shared_namespace_file_yields_same_id() {
        let root = tempfile::tempdir().expect("tempdir");
        for pid in ["10", "11", "12"] {
            std::fs::create_dir_all(root.path().join(pid).join("ns")).expect("mkdir");
        }
        let shared = root.path().join("10/ns/net");
        std::fs::write(&shared, b"").expect("write");
        std::fs::hard_link(&shared, root.path().join("11/ns/net")).expect("link");
        std::fs::write(root.path().join("12/ns/net"), b"").expect("write");

        let table = ProcFs::new(root.path());
        let a = table.netns_of(10).expect("pid 10");
        let b = table.netns_of(11).expect("pid 11");
        let c = table.netns_of(12).expect("pid 12");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.path, root.path().join("10/ns/net"));
    }

    #[test]
    fn procfs_missing_process_is_an_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let table = ProcFs::new(root.path());
        assert!(table.netns_of(4242).is_err());
    }
}
