use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, WaitPidFlag};
use nix::unistd::Pid;

use crate::{misc, MemorySize, ResourceUsage, TerminationStatus};

/// RAII guard ensuring the monitored child is never left running if the monitor loop exits
/// through an error path before observing a terminal wait status.
struct WaitPidGuard {
    pid: Pid,
    kill: bool,
}

impl WaitPidGuard {
    fn new(pid: Pid) -> Self {
        WaitPidGuard { pid, kill: true }
    }

    fn wait(&mut self, options: Option<WaitPidFlag>) -> nix::Result<WaitStatus> {
        let wait_res = nix::sys::wait::waitpid(self.pid, options);
        if let Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) = wait_res {
            self.kill = false;
        }
        wait_res
    }
}

impl Drop for WaitPidGuard {
    fn drop(&mut self) {
        if self.kill {
            let _ = nix::sys::signal::kill(self.pid, Signal::SIGKILL);
        }
    }
}

pub type MonitorJoinHandle = JoinHandle<()>;

/// Shared state between the monitor thread and the `Sandbox::run` caller.
pub struct MonitorContext {
    pid: Pid,
    wall_time_limit: Duration,
    cpu_time_limit: Duration,
    memory_limit: MemorySize,
    status: Mutex<TerminationStatus>,
    usage: Mutex<ResourceUsage>,
    /// Highest `VmHWM` reading observed over the process's life, in KB. `VmHWM` is a kernel-
    /// maintained high-water mark, so any single reading while the process is alive already
    /// reflects its peak-so-far; this is the authoritative peak-RSS figure reported to callers,
    /// with the polled `usage.resident_set_size` serving only the during-execution limit check.
    peak_rss_kb: Mutex<u64>,
}

impl MonitorContext {
    pub fn new(
        pid: i32,
        wall_time_limit: Duration,
        cpu_time_limit: Duration,
        memory_limit: MemorySize,
    ) -> MonitorContext {
        MonitorContext {
            pid: Pid::from_raw(pid),
            wall_time_limit,
            cpu_time_limit,
            memory_limit,
            status: Mutex::new(TerminationStatus::SandboxError("not exited".to_owned())),
            usage: Mutex::new(ResourceUsage::empty()),
            peak_rss_kb: Mutex::new(0),
        }
    }

    pub fn status(&self) -> TerminationStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn usage(&self) -> ResourceUsage {
        *self.usage.lock().unwrap()
    }

    pub fn peak_rss_kb(&self) -> u64 {
        *self.peak_rss_kb.lock().unwrap()
    }

    fn record_peak_rss_kb(&self, kb: u64) {
        let mut slot = self.peak_rss_kb.lock().unwrap();
        if kb > *slot {
            *slot = kb;
        }
    }
}

/// Interval between consecutive `waitpid(WNOHANG)` polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn update_usage(pid: Pid, slot: &Mutex<ResourceUsage>) -> ResourceUsage {
    let mut usage = slot.lock().unwrap();
    if let Ok(sample) = ResourceUsage::usage_of(pid.as_raw()) {
        usage.update(&sample);
    }
    *usage
}

fn monitor_main(context: &MonitorContext) -> TerminationStatus {
    let mut guard = WaitPidGuard::new(context.pid);
    let timer = SystemTime::now();

    loop {
        // Sample VmHWM while the process is still known alive, before the waitpid call below may
        // reap it out from under `/proc/<pid>/status`. It's a kernel high-water mark, so even one
        // reading per poll interval already reflects the true peak as of this instant.
        if let Some(kb) = misc::read_vm_hwm_kb(context.pid.as_raw()) {
            context.record_peak_rss_kb(kb);
        }

        let wait_status = match guard.wait(Some(WaitPidFlag::WNOHANG)) {
            Ok(s) => s,
            Err(e) => return TerminationStatus::SandboxError(format!("waitpid failed: {}", e)),
        };

        let mut reaped_ambiguous_sigkill = false;
        match wait_status {
            WaitStatus::Exited(_, code) => return TerminationStatus::Completed(code),
            WaitStatus::Signaled(_, Signal::SIGUSR1, _) =>
                return TerminationStatus::SandboxError("child failed to start".to_owned()),
            WaitStatus::Signaled(_, Signal::SIGKILL, _) => {
                // Ambiguous: either our own timeout/memory kill or an external one. The caller
                // distinguishes by checking elapsed wall time and peak memory below, so fall
                // through to the usual limit check rather than returning immediately.
                reaped_ambiguous_sigkill = true;
            }
            WaitStatus::Signaled(_, Signal::SIGSEGV, _) => return TerminationStatus::MemoryExceeded,
            WaitStatus::Signaled(_, sig, _) => return TerminationStatus::Signaled(sig),
            _ => (),
        }

        // Skip this check when we just reaped an ambiguous SIGKILL: the process is already dead
        // and the usual limit-attribution logic below must get the chance to classify it.
        if !reaped_ambiguous_sigkill && crate::cancellation::is_cancelled() {
            let _ = nix::sys::signal::kill(context.pid, Signal::SIGKILL);
            let _ = nix::sys::wait::waitpid(context.pid, None);
            return TerminationStatus::Cancelled;
        }

        let usage = update_usage(context.pid, &context.usage);
        let elapsed = timer.elapsed().unwrap_or_default();

        if usage.cpu_time() > context.cpu_time_limit || elapsed > context.wall_time_limit {
            let _ = nix::sys::signal::kill(context.pid, Signal::SIGKILL);
            let _ = nix::sys::wait::waitpid(context.pid, None);
            return TerminationStatus::TimedOut;
        }
        if usage.resident_set_size > context.memory_limit
            || usage.virtual_mem_size > context.memory_limit {
            let _ = nix::sys::signal::kill(context.pid, Signal::SIGKILL);
            let _ = nix::sys::wait::waitpid(context.pid, None);
            return TerminationStatus::MemoryExceeded;
        }

        if let WaitStatus::Signaled(_, Signal::SIGKILL, _) = wait_status {
            // We observed our own SIGKILL reap without attributing it to a limit above (e.g. the
            // process died between the signal and this poll); fall back to the tracked VmHWM peak
            // (or, if we never got a single sample, one last best-effort read) before giving up
            // and calling it a plain signal kill.
            let peak_kb = match context.peak_rss_kb() {
                0 => misc::read_vm_hwm_kb(context.pid.as_raw()).unwrap_or(0),
                kb => kb,
            };
            if peak_kb * 1024 > context.memory_limit.bytes() as u64 {
                return TerminationStatus::MemoryExceeded;
            }
            return TerminationStatus::Signaled(Signal::SIGKILL);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

pub fn start(context: Arc<MonitorContext>) -> MonitorJoinHandle {
    std::thread::spawn(move || {
        let status = monitor_main(&context);
        *context.status.lock().unwrap() = status;
    })
}
