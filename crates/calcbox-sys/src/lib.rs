//! Low-level Linux syscall wrappers for privilege staging.
//!
//! This crate provides thin wrappers around the two security syscalls the
//! front end stages before touching untrusted input. For standard syscalls,
//! use rustix.
//!
//! ## Modules
//!
//! - **creds** - Permanent credential dropping (setresgid/setresuid)
//! - **seccomp** - Seccomp-BPF syscall allow-list
//!
//! Both transitions are one-way: there is no teardown path, and callers are
//! expected to abort the process when either fails.
//!
//! # Safety
//!
//! This crate contains raw syscall wrappers. Casts between integer types
//! are unavoidable when interfacing with the kernel ABI.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod creds;
pub mod seccomp;

#[inline]
pub fn last_errno() -> rustix::io::Errno {
    // SAFETY: __errno_location always returns valid thread-local pointer.
    rustix::io::Errno::from_raw_os_error(unsafe { *libc::__errno_location() })
}
