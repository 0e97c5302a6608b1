//! Scoped entry into a network namespace.
//!
//! `setns(2)` changes the namespace of the calling OS thread, not of a
//! logical task. A [`NamespaceSession`] records the thread's namespace
//! before switching and switches back when dropped, so the change never
//! outlives the scope that made it. Callers must keep the session on the
//! thread that created it, so it is `!Send`.

use std::fs::File;
use std::marker::PhantomData;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use ngraph_common::constants::THREAD_SELF_NETNS;
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{NamespaceHandle, NamespaceId};
use nix::sched::{CloneFlags, setns};

/// The calling thread's stay inside a network namespace.
#[derive(Debug)]
pub struct NamespaceSession {
    /// Namespace to return to, `None` when no switch was needed.
    origin: Option<(File, NamespaceId)>,
    target: NamespaceId,
    _not_send: PhantomData<*const ()>,
}

impl NamespaceSession {
    /// Moves the calling thread into the namespace of `handle`.
    ///
    /// No switch happens when the thread is already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the current or target namespace file cannot be
    /// opened, if the target no longer refers to `handle.id` (the owning
    /// process exited and its pid was reused), or if `setns(2)` fails.
    pub fn enter(handle: &NamespaceHandle) -> Result<Self> {
        let (current, current_id) = open_namespace(Path::new(THREAD_SELF_NETNS), handle.id)?;
        if current_id == handle.id {
            tracing::trace!(ns = %handle.id, "already in target namespace");
            return Ok(Self {
                origin: None,
                target: handle.id,
                _not_send: PhantomData,
            });
        }

        let (target, target_id) = open_namespace(&handle.path, handle.id)?;
        if target_id != handle.id {
            return Err(NgraphError::Namespace {
                id: handle.id,
                message: format!(
                    "pid {} now belongs to {target_id}, namespace is gone",
                    handle.pid
                ),
            });
        }

        setns(&target, CloneFlags::CLONE_NEWNET).map_err(|e| NgraphError::Namespace {
            id: handle.id,
            message: format!("setns failed: {e}"),
        })?;
        tracing::trace!(ns = %handle.id, pid = handle.pid, from = %current_id, "entered namespace");

        Ok(Self {
            origin: Some((current, current_id)),
            target: handle.id,
            _not_send: PhantomData,
        })
    }

    /// Namespace the thread is in for the lifetime of the session.
    #[must_use]
    pub const fn target(&self) -> NamespaceId {
        self.target
    }

    /// Returns the thread to its original namespace, reporting failure.
    ///
    /// Dropping the session does the same but can only log a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if switching back fails; the thread then remains in
    /// the target namespace and must not be reused for unrelated work.
    pub fn leave(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        let Some((origin, origin_id)) = self.origin.take() else {
            return Ok(());
        };
        setns(&origin, CloneFlags::CLONE_NEWNET).map_err(|e| NgraphError::Namespace {
            id: origin_id,
            message: format!("restoring from {} failed: {e}", self.target),
        })?;
        tracing::trace!(ns = %origin_id, from = %self.target, "restored namespace");
        Ok(())
    }
}

impl Drop for NamespaceSession {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(error = %e, "thread left in foreign network namespace");
        }
    }
}

fn open_namespace(path: &Path, for_id: NamespaceId) -> Result<(File, NamespaceId)> {
    let file = File::open(path).map_err(|e| NgraphError::Namespace {
        id: for_id,
        message: format!("open {}: {e}", path.display()),
    })?;
    let metadata = file.metadata().map_err(|e| NgraphError::Namespace {
        id: for_id,
        message: format!("stat {}: {e}", path.display()),
    })?;
    Ok((file, NamespaceId::new(metadata.ino())))
}
