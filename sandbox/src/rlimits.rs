//! Native `rlimit` bindings and the resource-limiter policy applied to every
//! sandboxed child between fork and exec.
//!
//! Limits are applied best-effort: a kernel that refuses one of these ceilings
//! must never abort the child's startup, it only loses that particular
//! ceiling. Failures are logged and otherwise ignored.

use std::time::Duration;

use libc::rlimit;

use crate::MemorySize;

/// A native resource governed by `setrlimit`.
#[repr(u32)]
#[derive(Clone, Copy, Debug)]
pub enum Resource {
    /// Maximum size of the process's virtual memory (address space).
    AddressSpace = libc::RLIMIT_AS,

    /// CPU time available to the process, in seconds.
    CPUTime = libc::RLIMIT_CPU,

    /// Maximum number of processes/threads the user may own.
    NumProcesses = libc::RLIMIT_NPROC,

    /// Maximum number of simultaneously open file descriptors.
    NumFiles = libc::RLIMIT_NOFILE,

    /// Maximum size of a core dump file.
    CoreDumpSize = libc::RLIMIT_CORE,
}

/// Soft and hard ceiling for a single resource.
#[derive(Clone, Copy, Debug)]
pub struct ResourceLimit {
    pub soft_limit: u64,
    pub hard_limit: u64,
}

impl ResourceLimit {
    fn as_native(&self) -> rlimit {
        rlimit {
            rlim_cur: self.soft_limit,
            rlim_max: self.hard_limit,
        }
    }
}

/// Set a resource limit for the calling process.
pub fn setrlimit(resource: Resource, limit: &ResourceLimit) -> std::io::Result<()> {
    let ret = unsafe { libc::setrlimit(resource as u32, &limit.as_native()) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Set both the soft and hard limit of `resource` to the same value.
pub fn setrlimit_hard(resource: Resource, limit: u64) -> std::io::Result<()> {
    setrlimit(
        resource,
        &ResourceLimit {
            soft_limit: limit,
            hard_limit: limit,
        },
    )
}

/// Maximum number of processes/threads a judgee is allowed to spawn.
const MAX_PROCESSES: u64 = 50;

/// Maximum number of simultaneously open file descriptors.
const MAX_OPEN_FILES: u64 = 64;

/// The fixed ceiling policy applied to every judgee invocation.
#[derive(Clone, Copy, Debug)]
pub struct ResourceLimiterConfig {
    pub cpu_time_limit: Duration,
    pub memory_limit: MemorySize,
}

/// Apply the resource-limiter policy to the calling process.
///
/// Each ceiling is applied independently; a kernel that rejects one ceiling
/// (say, because `RLIMIT_NPROC` is not supported in this container's user
/// namespace) only costs that ceiling, not the others, and never fails this
/// function. This must be called in the child after `fork`, before `execve`.
pub fn apply(config: &ResourceLimiterConfig) {
    let cpu_secs = config.cpu_time_limit.as_secs().max(1);
    apply_one(Resource::CPUTime, &ResourceLimit {
        soft_limit: cpu_secs,
        hard_limit: cpu_secs + 1,
    });

    let mem_bytes = config.memory_limit.bytes() as u64;
    apply_one(Resource::AddressSpace, &ResourceLimit {
        soft_limit: mem_bytes,
        hard_limit: mem_bytes,
    });

    apply_one(Resource::NumProcesses, &ResourceLimit {
        soft_limit: MAX_PROCESSES,
        hard_limit: MAX_PROCESSES,
    });
    apply_one(Resource::NumFiles, &ResourceLimit {
        soft_limit: MAX_OPEN_FILES,
        hard_limit: MAX_OPEN_FILES,
    });
    apply_one(Resource::CoreDumpSize, &ResourceLimit {
        soft_limit: 0,
        hard_limit: 0,
    });
}

fn apply_one(resource: Resource, limit: &ResourceLimit) {
    if let Err(e) = setrlimit(resource, limit) {
        log::warn!("failed to apply rlimit {:?} ({:?}): {}", resource, limit, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_limiter_config_converts_cpu_seconds() {
        let config = ResourceLimiterConfig {
            cpu_time_limit: Duration::from_millis(2500),
            memory_limit: MemorySize::MegaBytes(256),
        };
        assert_eq!(2, config.cpu_time_limit.as_secs());
        assert_eq!(256 * 1024 * 1024, config.memory_limit.bytes());
    }
}
