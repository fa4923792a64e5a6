//! Side-channel helpers that act on behalf of the session user.

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use super::{Session, SessionId};

/// Errors from acting as the session user.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The session has no resolved user id.
    #[error("session {0} has no user id")]
    UnknownUser(SessionId),

    /// Switching or restoring the effective identity failed.
    #[error("failed to switch effective identity")]
    Switch(#[source] io::Error),

    /// The session has no leader process to read from.
    #[error("session {0} has no leader process")]
    NoLeader(SessionId),

    /// Reading the leader environment failed.
    #[error("failed to read environment of pid {pid}")]
    Environment {
        /// Leader process id.
        pid: u32,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl Session {
    /// User id of the session owner.
    pub fn userid(&self) -> Option<u32> {
        self.read_attributes().uid
    }

    /// Reads an environment variable from the session leader process.
    ///
    /// Returns `Ok(None)` when the variable is not set.
    pub fn getenv(&self, name: &str) -> Result<Option<String>, IdentityError> {
        let pid = self
            .read_attributes()
            .leader
            .ok_or_else(|| IdentityError::NoLeader(self.id().clone()))?;
        let raw = fs::read(format!("/proc/{}/environ", pid))
            .map_err(|source| IdentityError::Environment { pid, source })?;
        Ok(lookup_environ(&raw, name))
    }

    /// Runs `action` with the effective uid/gid of the session user.
    ///
    /// The caller identity is restored afterwards, also when `action`
    /// panics; the panic is then resumed. Effective ids are process-wide.
    pub fn call<F, R>(&self, action: F) -> Result<R, IdentityError>
    where
        F: FnOnce() -> R,
    {
        let (uid, gid) = {
            let attributes = self.read_attributes();
            (attributes.uid, attributes.gid)
        };
        let uid = uid.ok_or_else(|| IdentityError::UnknownUser(self.id().clone()))?;
        run_as(uid, gid, action)
    }
}

/// Runs `action` as `uid` (and `gid`, when given), restoring the previous
/// effective identity on return or unwind.
pub(crate) fn run_as<F, R>(uid: u32, gid: Option<u32>, action: F) -> Result<R, IdentityError>
where
    F: FnOnce() -> R,
{
    let guard = EffectiveIdentity::switch(uid, gid).map_err(IdentityError::Switch)?;
    let outcome = panic::catch_unwind(AssertUnwindSafe(action));
    let restored = guard.restore();
    match outcome {
        Ok(value) => restored.map(|()| value).map_err(IdentityError::Switch),
        Err(payload) => {
            if let Err(e) = restored {
                tracing::error!(error = %e, "failed to restore effective identity");
            }
            panic::resume_unwind(payload)
        }
    }
}

/// Saved caller identity. Dropping it without `restore()` still restores.
struct EffectiveIdentity {
    uid: libc::uid_t,
    gid: libc::gid_t,
    restored: bool,
}

impl EffectiveIdentity {
    fn switch(uid: u32, gid: Option<u32>) -> io::Result<Self> {
        // SAFETY: geteuid/getegid have no preconditions.
        let saved = unsafe {
            Self {
                uid: libc::geteuid(),
                gid: libc::getegid(),
                restored: false,
            }
        };
        if let Some(gid) = gid {
            // SAFETY: plain syscall wrapper, result checked.
            if unsafe { libc::setegid(gid) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        // SAFETY: plain syscall wrapper, result checked.
        if unsafe { libc::seteuid(uid) } != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: as above; best effort, the gid was changed by us.
            unsafe { libc::setegid(saved.gid) };
            return Err(err);
        }
        Ok(saved)
    }

    fn restore(mut self) -> io::Result<()> {
        self.restored = true;
        Self::apply(self.uid, self.gid)
    }

    fn apply(uid: libc::uid_t, gid: libc::gid_t) -> io::Result<()> {
        // uid first: regaining root is what allows the gid change.
        // SAFETY: plain syscall wrappers, results checked.
        if unsafe { libc::seteuid(uid) } != 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::setegid(gid) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for EffectiveIdentity {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = Self::apply(self.uid, self.gid) {
                tracing::error!(error = %e, "failed to restore effective identity");
            }
        }
    }
}

/// Finds `name` in a NUL separated `KEY=value` block.
fn lookup_environ(raw: &[u8], name: &str) -> Option<String> {
    raw.split(|b| *b == 0).find_map(|entry| {
        let entry = String::from_utf8_lossy(entry);
        let (key, value) = entry.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionAttributes;

    fn current_ids() -> (u32, u32) {
        // SAFETY: no preconditions.
        unsafe { (libc::geteuid(), libc::getegid()) }
    }

    #[test]
    fn lookup_environ_finds_variables() {
        let raw = b"HOME=/home/alice\0DISPLAY=:0\0EMPTY=\0";
        assert_eq!(lookup_environ(raw, "DISPLAY"), Some(":0".to_string()));
        assert_eq!(lookup_environ(raw, "EMPTY"), Some(String::new()));
        assert_eq!(lookup_environ(raw, "PATH"), None);
        assert_eq!(lookup_environ(b"", "HOME"), None);
    }

    #[test]
    fn call_without_uid_fails() {
        let session = Session::new("c1");
        let err = session.call(|| ()).expect_err("no uid");
        assert!(matches!(err, IdentityError::UnknownUser(_)));
    }

    #[test]
    fn call_as_current_user_runs_action() {
        let (uid, gid) = current_ids();
        let session = Session::new("c2").with_attributes(SessionAttributes {
            uid: Some(uid),
            gid: Some(gid),
            ..Default::default()
        });
        let seen = session.call(|| current_ids()).expect("same identity");
        assert_eq!(seen, (uid, gid));
        assert_eq!(current_ids(), (uid, gid));
    }

    #[test]
    fn identity_is_restored_after_panic() {
        let (uid, gid) = current_ids();
        let session = Session::new("c3").with_attributes(SessionAttributes {
            uid: Some(uid),
            ..Default::default()
        });
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = session.call(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(current_ids(), (uid, gid));
    }

    #[test]
    fn getenv_reads_own_process_environment() {
        let session = Session::new("c4").with_attributes(SessionAttributes {
            leader: Some(std::process::id()),
            ..Default::default()
        });
        if !std::path::Path::new("/proc/self/environ").exists() {
            return;
        }
        // PATH is set for test processes; a made-up name is not.
        assert!(session
            .getenv("SESSION_WATCH_SURELY_UNSET_VARIABLE")
            .expect("readable")
            .is_none());
    }

    #[test]
    fn getenv_without_leader_fails() {
        let session = Session::new("c5");
        assert!(matches!(
            session.getenv("HOME"),
            Err(IdentityError::NoLeader(_))
        ));
    }
}
