//! Permanent credential dropping.
//!
//! The helper binary may be installed setuid/setgid so that the calling
//! process cannot keep it privileged. Before any argument is even looked at,
//! the process transitions to an unprivileged identity and verifies the
//! transition took. The order matters: supplementary groups are cleared and
//! the GID is set *before* the UID, otherwise the saved-set-user-ID would
//! still allow the group change to be undone.
//!
//! The transition is permanent (`setres*` sets real, effective and saved
//! ids). There is nothing to release afterwards, so no guard type exists.

use rustix::io::Errno;
use rustix::process::{getegid, geteuid, getgid, getuid};

use crate::last_errno;

/// Identity the process falls back to when it is actually root.
pub const NOBODY_UID: u32 = 65534;
pub const NOBODY_GID: u32 = 65534;

/// A resolved uid/gid pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

/// Error during the credential transition.
///
/// Callers treat every variant as fatal; the error exists so the failure
/// site can be named before aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredsError {
    Setgroups(Errno),
    Setgid(Errno),
    Setuid(Errno),
    /// The ids read back after the transition do not match the target.
    Verify,
}

impl std::fmt::Display for CredsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredsError::Setgroups(e) => write!(f, "setgroups: {e}"),
            CredsError::Setgid(e) => write!(f, "setresgid: {e}"),
            CredsError::Setuid(e) => write!(f, "setresuid: {e}"),
            CredsError::Verify => write!(f, "credential verification failed"),
        }
    }
}

impl std::error::Error for CredsError {}

/// Drop any elevated identity, permanently.
///
/// Returns the identity that was dropped to, or `None` when the process was
/// already running unprivileged and no transition was needed.
pub fn drop_to_unprivileged() -> Result<Option<Identity>, CredsError> {
    let real = Identity {
        uid: getuid().as_raw(),
        gid: getgid().as_raw(),
    };
    let effective = Identity {
        uid: geteuid().as_raw(),
        gid: getegid().as_raw(),
    };

    let Some(target) = target_identity(real, effective) else {
        return Ok(None);
    };

    // Only root can rewrite the supplementary group list; for a setuid
    // non-root helper the list is whatever the caller had, and EPERM here
    // is expected.
    // SAFETY: empty list pointer is never dereferenced with size 0.
    let ret = unsafe { libc::setgroups(0, std::ptr::null()) };
    if ret != 0 && effective.uid == 0 {
        return Err(CredsError::Setgroups(last_errno()));
    }

    // GID before UID.
    // SAFETY: setresgid atomically sets real, effective and saved GIDs.
    let ret = unsafe { libc::setresgid(target.gid, target.gid, target.gid) };
    if ret != 0 {
        return Err(CredsError::Setgid(last_errno()));
    }
    // SAFETY: setresuid atomically sets real, effective and saved UIDs.
    let ret = unsafe { libc::setresuid(target.uid, target.uid, target.uid) };
    if ret != 0 {
        return Err(CredsError::Setuid(last_errno()));
    }

    verify(target)?;
    Ok(Some(target))
}

/// Decide what identity to drop to, if any.
///
/// - any root id (real or effective) falls back to nobody;
/// - a setuid/setgid process falls back to its real ids;
/// - an already-unprivileged process needs no transition.
fn target_identity(real: Identity, effective: Identity) -> Option<Identity> {
    let uid = if real.uid == 0 || effective.uid == 0 {
        NOBODY_UID
    } else {
        real.uid
    };
    let gid = if real.gid == 0 || effective.gid == 0 {
        NOBODY_GID
    } else {
        real.gid
    };

    let target = Identity { uid, gid };
    if target == real && target == effective {
        None
    } else {
        Some(target)
    }
}

/// Read back all three uid/gid triples and require them to match `target`.
fn verify(target: Identity) -> Result<(), CredsError> {
    let (mut ruid, mut euid, mut suid) = (0, 0, 0);
    let (mut rgid, mut egid, mut sgid) = (0, 0, 0);
    // SAFETY: out-pointers are valid locals.
    let ret_u = unsafe { libc::getresuid(&mut ruid, &mut euid, &mut suid) };
    let ret_g = unsafe { libc::getresgid(&mut rgid, &mut egid, &mut sgid) };
    if ret_u != 0 || ret_g != 0 {
        return Err(CredsError::Verify);
    }

    let uids_ok = ruid == target.uid && euid == target.uid && suid == target.uid;
    let gids_ok = rgid == target.gid && egid == target.gid && sgid == target.gid;
    if uids_ok && gids_ok {
        Ok(())
    } else {
        Err(CredsError::Verify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(uid: u32, gid: u32) -> Identity {
        Identity { uid, gid }
    }

    #[test]
    fn unprivileged_process_needs_no_transition() {
        assert_eq!(target_identity(id(1000, 1000), id(1000, 1000)), None);
    }

    #[test]
    fn root_falls_back_to_nobody() {
        assert_eq!(
            target_identity(id(0, 0), id(0, 0)),
            Some(id(NOBODY_UID, NOBODY_GID))
        );
    }

    #[test]
    fn setuid_root_falls_back_to_nobody_uid() {
        // real user 1000, effective root: the elevated uid must not survive.
        assert_eq!(
            target_identity(id(1000, 1000), id(0, 1000)),
            Some(id(NOBODY_UID, 1000))
        );
    }

    #[test]
    fn setuid_non_root_falls_back_to_real_ids() {
        assert_eq!(
            target_identity(id(1000, 1000), id(2000, 1000)),
            Some(id(1000, 1000))
        );
    }

    #[test]
    fn setgid_falls_back_to_real_gid() {
        assert_eq!(
            target_identity(id(1000, 1000), id(1000, 2000)),
            Some(id(1000, 1000))
        );
    }

    // No live drop_to_unprivileged test: under a root test runner it would
    // really drop the harness process to nobody and poison every other test
    // in the binary. The decision logic above is the testable part.
}
