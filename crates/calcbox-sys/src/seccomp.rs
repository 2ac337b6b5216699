//! Seccomp-BPF syscall allow-list.
//!
//! The expression parser is the largest untrusted-input attack surface in
//! the process, so once the engine is configured the process locks itself
//! down to the handful of syscalls evaluation actually needs. The filter
//! runs on every syscall:
//!
//! 1. Verify architecture is `x86_64` (kill otherwise)
//! 2. Load the syscall number from `seccomp_data`
//! 3. Compare against the allow-list
//! 4. Allow on match, kill the process otherwise
//!
//! There is no errno or trap fallback: a syscall outside the list means the
//! parser or the engine has been subverted, and the kernel delivers SIGSYS
//! to the whole process. The filter cannot be removed once applied and
//! requires `PR_SET_NO_NEW_PRIVS` first.

use rustix::io::Errno;

use crate::last_errno;

// Seccomp constants
const SECCOMP_SET_MODE_FILTER: u32 = 1;
const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

// BPF instruction classes
const BPF_LD: u16 = 0x00;
const BPF_JMP: u16 = 0x05;
const BPF_RET: u16 = 0x06;

// BPF ld fields
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;

// BPF jmp fields
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;

const AUDIT_ARCH_X86_64: u32 = 0xc000_003e;

// seccomp_data offsets (x86_64)
const OFFSET_SYSCALL_NR: u32 = 0;
const OFFSET_ARCH: u32 = 4;

/// Maximum allow-list size (BPF jump offsets are u8).
const MAX_ALLOWLIST_SIZE: usize = 250;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SockFilter {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

impl SockFilter {
    #[inline]
    pub const fn stmt(code: u16, k: u32) -> Self {
        Self {
            code,
            jt: 0,
            jf: 0,
            k,
        }
    }

    #[inline]
    pub const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        Self { code, jt, jf, k }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct SockFprog {
    pub len: u16,
    pub filter: *const SockFilter,
}

/// Syscalls the sandboxed evaluation path is allowed to make.
///
/// The list covers: memory management for the allocator, reads and writes
/// on descriptors that are already open (stdout for frames, stderr for
/// logging), clock reads for evaluation deadlines, thread-runtime
/// bookkeeping, and clean or abortive exit. Notably absent: every `open`
/// variant, `fork`/`clone`/`execve`, and the whole socket family - the
/// update path that needs network access runs before this filter exists.
pub const EVALUATION_ALLOWLIST: &[i64] = &[
    // === I/O on already-open descriptors ===
    libc::SYS_read,
    libc::SYS_write,
    libc::SYS_writev,
    libc::SYS_close,
    libc::SYS_fstat,
    libc::SYS_lseek,
    libc::SYS_fcntl,
    libc::SYS_poll,
    libc::SYS_ppoll,
    // === Memory ===
    libc::SYS_mmap,
    libc::SYS_munmap,
    libc::SYS_mprotect,
    libc::SYS_mremap,
    libc::SYS_brk,
    libc::SYS_madvise,
    libc::SYS_membarrier,
    // === Time (evaluation deadlines) ===
    libc::SYS_clock_gettime,
    libc::SYS_clock_getres,
    libc::SYS_gettimeofday,
    libc::SYS_nanosleep,
    // === Signals and exit ===
    libc::SYS_rt_sigaction,
    libc::SYS_rt_sigprocmask,
    libc::SYS_rt_sigreturn,
    libc::SYS_sigaltstack,
    libc::SYS_tgkill, // abort() raises SIGABRT at itself
    libc::SYS_exit,
    libc::SYS_exit_group,
    // === Thread runtime bookkeeping ===
    libc::SYS_futex,
    libc::SYS_sched_yield,
    libc::SYS_set_robust_list,
    libc::SYS_get_robust_list,
    libc::SYS_rseq,
    libc::SYS_getpid,
    libc::SYS_gettid,
    libc::SYS_getrandom,
    libc::SYS_prlimit64,
];

/// Builds the allow-list BPF filter.
///
/// ## Filter Layout
///
/// ```text
/// [0-2]  Architecture check (x86_64, kill on mismatch)
/// [3]    Load syscall number
/// [4..N] Allow-list checks -> ALLOW
/// [N+1]  RET KILL (default deny)
/// [N+2]  RET ALLOW
/// ```
///
/// # Panics
///
/// Panics if `syscalls.len()` > 250 (BPF jump offsets are u8).
pub fn build_allowlist_filter(syscalls: &[i64]) -> Vec<SockFilter> {
    assert!(
        syscalls.len() <= MAX_ALLOWLIST_SIZE,
        "allow-list too large: {} > {} (BPF jump offset overflow)",
        syscalls.len(),
        MAX_ALLOWLIST_SIZE
    );

    let n = syscalls.len();
    let mut filter = Vec::with_capacity(n + 6);

    // === Architecture check ===
    filter.push(SockFilter::stmt(BPF_LD | BPF_W | BPF_ABS, OFFSET_ARCH));
    filter.push(SockFilter::jump(
        BPF_JMP | BPF_JEQ | BPF_K,
        AUDIT_ARCH_X86_64,
        1,
        0,
    ));
    filter.push(SockFilter::stmt(BPF_RET | BPF_K, SECCOMP_RET_KILL_PROCESS));

    // === Load syscall number ===
    filter.push(SockFilter::stmt(
        BPF_LD | BPF_W | BPF_ABS,
        OFFSET_SYSCALL_NR,
    ));

    // === Allow-list check ===
    for (i, &nr) in syscalls.iter().enumerate() {
        let allow_offset = (n - i) as u8;
        filter.push(SockFilter::jump(
            BPF_JMP | BPF_JEQ | BPF_K,
            nr as u32,
            allow_offset,
            0,
        ));
    }

    // === Default deny ===
    filter.push(SockFilter::stmt(BPF_RET | BPF_K, SECCOMP_RET_KILL_PROCESS));

    // === ALLOW ===
    filter.push(SockFilter::stmt(BPF_RET | BPF_K, SECCOMP_RET_ALLOW));

    filter
}

/// Applies a seccomp-BPF filter to the calling thread, permanently.
///
/// Sets `PR_SET_NO_NEW_PRIVS` first (required for unprivileged seccomp).
///
/// # Safety
///
/// The filter must be a valid BPF program; the kernel does not validate
/// jump targets beyond bounds checks. Once applied there is no way back.
///
/// # Errors
///
/// Returns `Errno` if either prctl or the seccomp syscall fails.
pub unsafe fn install_filter(filter: &[SockFilter]) -> Result<(), Errno> {
    let ret = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if ret != 0 {
        return Err(last_errno());
    }

    let fprog = SockFprog {
        len: filter.len() as u16,
        filter: filter.as_ptr(),
    };
    let ret = unsafe {
        libc::syscall(
            libc::SYS_seccomp,
            SECCOMP_SET_MODE_FILTER,
            0u32,
            &fprog as *const _,
        )
    };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

/// Returns true if seccomp is available on this kernel.
pub fn seccomp_available() -> bool {
    unsafe { libc::prctl(libc::PR_GET_SECCOMP, 0, 0, 0, 0) >= 0 }
}
