use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::os::unix::io::RawFd;

use nix::fcntl::{FcntlArg, FdFlag};

/// Check if the given string slice is a valid C-style string.
///
/// Formally, this function checks whether the byte sequence of the string slice contains any
/// b'\x00'. If so, this function returns `false`.
pub fn is_valid_c_string(s: &str) -> bool {
    !s.as_bytes().contains(&b'\x00')
}

/// Get number of clocks in one second.
pub fn clocks_per_sec() -> i64 {
    // Posix requires CLOCKS_PER_SEC be one million when sysconf is unavailable.
    const CLOCKS_PER_SEC: i64 = 1_000_000;

    let ret = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ret == -1 {
        log::warn!("failed to get system clock speed through sysconf, using CLOCKS_PER_SEC");
        CLOCKS_PER_SEC
    } else {
        ret
    }
}

/// Create a `Duration` instance from a clock-ticks count.
pub fn duration_from_clocks(clocks: libc::clock_t) -> Duration {
    Duration::from_secs_f64(clocks as f64 / clocks_per_sec() as f64)
}

/// Get the size of one memory page in bytes, the unit `/proc/<pid>/stat`'s `rss` field counts in.
pub fn page_size_bytes() -> i64 {
    const DEFAULT_PAGE_SIZE: i64 = 4096;

    let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ret == -1 {
        log::warn!("failed to get system page size through sysconf, using default of 4096 bytes");
        DEFAULT_PAGE_SIZE
    } else {
        ret
    }
}

/// `dup2(old_fd, new_fd)` with `O_CLOEXEC` set on the original descriptor, so it does not leak
/// into the child once the duplicate has taken its place.
pub fn dup_and_cloexec(old_fd: RawFd, new_fd: RawFd) -> nix::Result<()> {
    nix::unistd::dup2(old_fd, new_fd)?;
    nix::fcntl::fcntl(old_fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(())
}

/// Expand the `PATH` environment variable in front of `path` and return the first candidate that
/// exists on disk.
pub fn expand_path<'a, P>(path: &'a P) -> Option<Cow<'a, Path>>
    where P: ?Sized + AsRef<Path> {
    let original = path.as_ref();
    if original.exists() {
        return Some(Cow::Borrowed(original));
    }
    if original.is_absolute() {
        return None;
    }

    let path_env = match std::env::var_os("PATH") {
        Some(p) => p.to_string_lossy().into_owned(),
        None => return None,
    };
    for dir_path in path_env.split(':') {
        let mut candidate = PathBuf::from(dir_path);
        candidate.push(original);
        if candidate.exists() {
            return Some(Cow::Owned(candidate));
        }
    }

    None
}

/// Read the peak resident-set size (`VmHWM`) of a process from `/proc/<pid>/status`.
///
/// This is the fallback peak-memory measurement used whenever the primary, polling-based
/// measurement in `daemon` could not observe the process (it exited between two polls, or the
/// scratch-file-based reading failed). Returns `None` if the file cannot be read or parsed, which
/// happens once the process has already been reaped.
pub fn read_vm_hwm_kb(pid: i32) -> Option<u64> {
    let path = format!("/proc/{}/status", pid);
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmHWM:") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

/// A Go-style deferred cleanup: runs `f` when the `Disposer` is dropped, on every exit path
/// (normal return, early `?`, or panic unwinding). Used to guarantee scratch-file removal
/// regardless of how a sandboxed run ends.
pub struct Disposer<F: FnOnce()> {
    action: Option<F>,
}

impl<F: FnOnce()> Disposer<F> {
    pub fn new(action: F) -> Self {
        Disposer { action: Some(action) }
    }

    /// Cancel the deferred action; it will not run on drop.
    pub fn cancel(mut self) {
        self.action = None;
    }
}

impl<F: FnOnce()> Drop for Disposer<F> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_is_valid_c_string() {
        assert!(is_valid_c_string("abc哈哈哈"));
        assert!(!is_valid_c_string("abc\x00哈哈哈"));
    }

    #[test]
    fn disposer_runs_action_on_drop() {
        let ran = Cell::new(false);
        {
            let _d = Disposer::new(|| ran.set(true));
        }
        assert!(ran.get());
    }

    #[test]
    fn disposer_skips_action_when_cancelled() {
        let ran = Cell::new(false);
        let d = Disposer::new(|| ran.set(true));
        d.cancel();
        assert!(!ran.get());
    }

    #[test]
    fn read_vm_hwm_kb_parses_self_status() {
        let pid = std::process::id() as i32;
        assert!(read_vm_hwm_kb(pid).is_some());
    }
}
