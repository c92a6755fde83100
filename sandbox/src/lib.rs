//! Process-level sandboxing primitives: the Resource Limiter and the Sandbox
//! Launcher.
//!
//! This crate knows nothing about test cases, problems, or verdicts — it
//! exposes one operation, [`Sandbox::run`], that launches a command under a
//! wall-clock ceiling, a CPU/memory ceiling enforced both natively (via
//! `rlimit`) and by an external polling monitor, optional network isolation,
//! and captures bounded stdout/stderr. Higher layers (the `harness` crate)
//! translate the resulting [`SandboxOutcome`] into their own domain types.

#[macro_use]
extern crate error_chain;
extern crate libc;
extern crate nix;
extern crate procinfo;

pub mod cancellation;
mod daemon;
mod misc;
pub mod rlimits;

use std::cmp::Ordering;
use std::ffi::CString;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::IntoRawFd;

use nix::sys::signal::Signal;
use nix::unistd::ForkResult;

pub use misc::Disposer;
use rlimits::ResourceLimiterConfig;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
    }

    errors {
        InvalidCommand(arg: String) {
            description("invalid argv or environment entry")
            display("invalid argv or environment entry: {}", arg)
        }

        DaemonJoinFailed {
            description("failed to join the sandbox monitor thread")
        }

        ChildStartupFailed {
            description("sandboxed child process failed to start")
        }
    }
}

/// Measurement of the size of a block of memory.
#[derive(Clone, Copy, Debug, Eq)]
pub enum MemorySize {
    Bytes(usize),
    KiloBytes(usize),
    MegaBytes(usize),
    GigaBytes(usize),
    TeraBytes(usize),
}

impl MemorySize {
    pub fn bytes(&self) -> usize {
        match self {
            MemorySize::Bytes(s) => *s,
            MemorySize::KiloBytes(s) => s * 1024,
            MemorySize::MegaBytes(s) => s * 1024 * 1024,
            MemorySize::GigaBytes(s) => s * 1024 * 1024 * 1024,
            MemorySize::TeraBytes(s) => s * 1024 * 1024 * 1024 * 1024,
        }
    }

    pub fn kilobytes(&self) -> u64 {
        (self.bytes() / 1024) as u64
    }
}

impl PartialEq for MemorySize {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for MemorySize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemorySize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(&other.bytes())
    }
}

impl From<usize> for MemorySize {
    fn from(value: usize) -> MemorySize {
        MemorySize::Bytes(value)
    }
}

impl Display for MemorySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySize::Bytes(s) => write!(f, "{} B", s),
            MemorySize::KiloBytes(s) => write!(f, "{} KB", s),
            MemorySize::MegaBytes(s) => write!(f, "{} MB", s),
            MemorySize::GigaBytes(s) => write!(f, "{} GB", s),
            MemorySize::TeraBytes(s) => write!(f, "{} TB", s),
        }
    }
}

/// Upper bound on captured stdout, per §4.2.
const STDOUT_CAPTURE_LIMIT: usize = 100_000;

/// Upper bound on captured stderr, per §4.2.
const STDERR_CAPTURE_LIMIT: usize = 10_000;

/// Input to one sandboxed run.
pub struct SandboxConfig {
    /// `argv[0]` and the remaining arguments.
    pub command: Vec<String>,

    /// Environment variables passed verbatim to the child.
    pub envs: Vec<(String, String)>,

    /// Working directory of the child process.
    pub working_dir: Option<PathBuf>,

    /// Bytes fed to the child's stdin. Empty if the child has no input.
    pub stdin: Vec<u8>,

    /// Wall-clock ceiling; exceeding it kills the child with an unblockable signal.
    pub wall_time_limit: Duration,

    /// CPU-time ceiling enforced both natively and by the monitor thread.
    pub cpu_time_limit: Duration,

    /// Memory ceiling enforced both natively (address space) and by the monitor thread (RSS).
    pub memory_limit: MemorySize,

    /// Attempt to place the child in its own network namespace. Best-effort: if the kernel
    /// refuses, the child still runs, just without isolation.
    pub network_isolation: bool,
}

impl SandboxConfig {
    pub fn new<I, S>(command: I) -> SandboxConfig
        where I: IntoIterator<Item = S>, S: Into<String> {
        SandboxConfig {
            command: command.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
            working_dir: None,
            stdin: Vec::new(),
            wall_time_limit: Duration::from_secs(5),
            cpu_time_limit: Duration::from_secs(5),
            memory_limit: MemorySize::MegaBytes(256),
            network_isolation: false,
        }
    }
}

/// How a sandboxed run ended.
#[derive(Clone, Debug)]
pub enum TerminationStatus {
    /// The process ran to completion with the given exit code.
    Completed(i32),

    /// Killed by the wall-clock timeout wrapper.
    TimedOut,

    /// Killed, or inferred killed, for exceeding the memory ceiling.
    MemoryExceeded,

    /// Killed by a signal not otherwise classified (e.g. SIGSEGV, SIGABRT).
    Signaled(Signal),

    /// Killed because the process received a cancellation signal while this run was in flight.
    Cancelled,

    /// The sandbox itself failed to launch or monitor the child.
    SandboxError(String),
}

/// Resource usage observed over the lifetime of a sandboxed process.
#[derive(Clone, Copy, Debug)]
pub struct ResourceUsage {
    pub user_cpu_time: Duration,
    pub kernel_cpu_time: Duration,
    pub virtual_mem_size: MemorySize,
    pub resident_set_size: MemorySize,
}

impl ResourceUsage {
    pub fn empty() -> ResourceUsage {
        ResourceUsage {
            user_cpu_time: Duration::new(0, 0),
            kernel_cpu_time: Duration::new(0, 0),
            virtual_mem_size: MemorySize::Bytes(0),
            resident_set_size: MemorySize::Bytes(0),
        }
    }

    pub fn usage_of(pid: i32) -> std::io::Result<ResourceUsage> {
        Ok(ResourceUsage::from(procinfo::pid::stat(pid)?))
    }

    pub fn cpu_time(&self) -> Duration {
        self.user_cpu_time + self.kernel_cpu_time
    }

    pub fn update(&mut self, other: &ResourceUsage) {
        if other.user_cpu_time > self.user_cpu_time {
            self.user_cpu_time = other.user_cpu_time;
        }
        if other.kernel_cpu_time > self.kernel_cpu_time {
            self.kernel_cpu_time = other.kernel_cpu_time;
        }
        if other.virtual_mem_size > self.virtual_mem_size {
            self.virtual_mem_size = other.virtual_mem_size;
        }
        if other.resident_set_size > self.resident_set_size {
            self.resident_set_size = other.resident_set_size;
        }
    }
}

impl From<procinfo::pid::Stat> for ResourceUsage {
    fn from(stat: procinfo::pid::Stat) -> ResourceUsage {
        // `stat.rss` is a page count, not a byte count, unlike `stat.vsize`; scale it up or every
        // reading comes out ~4096x too small and the memory ceiling can never trip.
        let resident_bytes = stat.rss * misc::page_size_bytes() as usize;
        ResourceUsage {
            user_cpu_time: misc::duration_from_clocks(stat.utime),
            kernel_cpu_time: misc::duration_from_clocks(stat.stime),
            virtual_mem_size: MemorySize::Bytes(stat.vsize),
            resident_set_size: MemorySize::Bytes(resident_bytes),
        }
    }
}

impl Default for ResourceUsage {
    fn default() -> ResourceUsage {
        ResourceUsage::empty()
    }
}

/// The outcome of one [`Sandbox::run`] call.
pub struct SandboxOutcome {
    pub status: TerminationStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_time: Duration,
    pub usage: ResourceUsage,
    /// Peak `VmHWM` observed over the process's life, in KB. `0` if the monitor never got a
    /// single sample (the process died between fork and the first poll).
    pub peak_rss_kb: u64,
}

impl SandboxOutcome {
    /// Peak resident-set size, preferring the `VmHWM`-based measurement (the true kernel-tracked
    /// high-water mark) and falling back to the polled `/proc/<pid>/stat` sample when `VmHWM` was
    /// never observed.
    pub fn peak_memory(&self) -> MemorySize {
        if self.peak_rss_kb > 0 {
            MemorySize::KiloBytes(self.peak_rss_kb as usize)
        } else {
            self.usage.resident_set_size
        }
    }
}

/// The process-execution sandbox: fork/exec plus the resource-limiter and wall-clock envelope
/// described by the Sandbox Launcher.
pub struct Sandbox;

impl Sandbox {
    /// Attempt once to determine whether this host can place a child in an isolated network
    /// namespace. Callers that need this information for many runs should call it once and reuse
    /// the result — the crate holds no cache of its own so that it stays fully reentrant.
    pub fn probe_network_unshare() -> bool {
        match nix::unistd::fork() {
            Ok(ForkResult::Child) => {
                let ok = nix::sched::unshare(nix::sched::CloneFlags::CLONE_NEWNET).is_ok();
                std::process::exit(if ok { 0 } else { 1 });
            }
            Ok(ForkResult::Parent { child }) => {
                match nix::sys::wait::waitpid(child, None) {
                    Ok(nix::sys::wait::WaitStatus::Exited(_, 0)) => true,
                    _ => false,
                }
            }
            Err(_) => false,
        }
    }

    /// Run `config.command` under the full sandbox envelope and return its outcome. Scratch files
    /// created for stdin/stdout/stderr capture are removed before this function returns,
    /// regardless of the exit path.
    pub fn run(config: &SandboxConfig) -> Result<SandboxOutcome> {
        if config.command.is_empty() {
            bail!(ErrorKind::InvalidCommand("empty command".to_owned()));
        }
        for arg in &config.command {
            if !misc::is_valid_c_string(arg) {
                bail!(ErrorKind::InvalidCommand(arg.clone()));
            }
        }

        let stdin_file = tempfile::NamedTempFile::new()?;
        {
            let mut f = stdin_file.reopen()?;
            f.write_all(&config.stdin)?;
            f.flush()?;
        }
        let stdout_file = tempfile::NamedTempFile::new()?;
        let stderr_file = tempfile::NamedTempFile::new()?;

        // stdin_file/stdout_file/stderr_file are NamedTempFile: their Drop impl unlinks the
        // backing path, so every exit path below — including `?` early returns — still cleans up.
        let stdin_fd = File::open(stdin_file.path())?;
        let stdout_fd = stdout_file.reopen()?;
        let stderr_fd = stderr_file.reopen()?;

        // `execve` does not search `PATH` the way `execvp` does, so a bare command name (e.g.
        // "python3" from a split `--command` string) must be resolved to a concrete path here.
        let resolved_file = misc::expand_path(&config.command[0])
            .map(|p| p.into_owned())
            .unwrap_or_else(|| PathBuf::from(&config.command[0]));

        let builder = ProcessBuilder {
            file: resolved_file,
            args: config.command.clone(),
            envs: config.envs.clone(),
            working_dir: config.working_dir.clone(),
            limits: ResourceLimiterConfig {
                cpu_time_limit: config.cpu_time_limit,
                memory_limit: config.memory_limit,
            },
            network_isolation: config.network_isolation,
            stdin: stdin_fd,
            stdout: stdout_fd,
            stderr: stderr_fd,
            wall_time_limit: config.wall_time_limit,
            memory_limit: config.memory_limit,
        };

        let start = std::time::Instant::now();
        let mut process = builder.start()?;
        process.wait_for_exit()?;
        let wall_time = start.elapsed();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        read_truncated(stdout_file.path(), STDOUT_CAPTURE_LIMIT, &mut stdout)?;
        read_truncated(stderr_file.path(), STDERR_CAPTURE_LIMIT, &mut stderr)?;

        Ok(SandboxOutcome {
            status: process.status(),
            stdout,
            stderr,
            wall_time,
            usage: process.usage(),
            peak_rss_kb: process.peak_rss_kb(),
        })
    }
}

fn read_truncated(path: &Path, limit: usize, out: &mut Vec<u8>) -> std::io::Result<()> {
    let mut f = File::open(path)?;
    f.seek(SeekFrom::Start(0))?;
    out.resize(limit, 0);
    let n = f.read(out)?;
    out.truncate(n);
    Ok(())
}

/// Internal fork/exec machinery. Not part of the public API: callers use [`Sandbox::run`].
struct ProcessBuilder {
    file: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
    limits: ResourceLimiterConfig,
    network_isolation: bool,
    stdin: File,
    stdout: File,
    stderr: File,
    wall_time_limit: Duration,
    memory_limit: MemorySize,
}

impl ProcessBuilder {
    fn start_child(self) -> Result<()> {
        let native_file = CString::new(Vec::from(self.file.as_os_str().as_bytes())).unwrap();
        let native_argv = self.args.iter()
            .map(|arg| CString::new(arg.clone()).unwrap())
            .collect::<Vec<CString>>();
        let native_envs = self.envs.iter()
            .map(|(k, v)| CString::new(format!("{}={}", k, v)).unwrap())
            .collect::<Vec<CString>>();

        misc::dup_and_cloexec(self.stdin.into_raw_fd(), libc::STDIN_FILENO)?;
        misc::dup_and_cloexec(self.stdout.into_raw_fd(), libc::STDOUT_FILENO)?;
        misc::dup_and_cloexec(self.stderr.into_raw_fd(), libc::STDERR_FILENO)?;

        if let Some(dir) = self.working_dir.as_ref() {
            nix::unistd::chdir(dir.as_path())?;
        }

        if self.network_isolation {
            if let Err(e) = nix::sched::unshare(nix::sched::CloneFlags::CLONE_NEWNET) {
                log::warn!("network unshare failed, running without network isolation: {}", e);
            }
        }

        rlimits::apply(&self.limits);

        nix::unistd::execve(&native_file, &native_argv, &native_envs)?;
        unreachable!()
    }

    fn start(self) -> Result<ProcessHandle> {
        let wall_time_limit = self.wall_time_limit;
        let cpu_time_limit = self.limits.cpu_time_limit;
        let memory_limit = self.memory_limit;
        match nix::unistd::fork()? {
            ForkResult::Parent { child } =>
                Ok(ProcessHandle::attach(child.as_raw(), wall_time_limit, cpu_time_limit, memory_limit)),
            ForkResult::Child => {
                match self.start_child() {
                    Ok(..) => unreachable!(),
                    Err(e) => {
                        eprintln!("failed to start sandboxed child: {}", e);
                        nix::sys::signal::kill(nix::unistd::getpid(), Signal::SIGUSR1)
                            .expect("cannot signal self");
                        loop {}
                    }
                }
            }
        }
    }
}

/// A handle to a running sandboxed child, backed by a monitor thread.
struct ProcessHandle {
    context: Arc<daemon::MonitorContext>,
    join: Option<daemon::MonitorJoinHandle>,
}

impl ProcessHandle {
    fn attach(
        pid: i32,
        wall_time_limit: Duration,
        cpu_time_limit: Duration,
        memory_limit: MemorySize,
    ) -> ProcessHandle {
        let context = Arc::new(
            daemon::MonitorContext::new(pid, wall_time_limit, cpu_time_limit, memory_limit));
        let join = daemon::start(context.clone());
        ProcessHandle { context, join: Some(join) }
    }

    fn wait_for_exit(&mut self) -> Result<()> {
        self.join.take().unwrap().join()
            .map_err(|_| Error::from(ErrorKind::DaemonJoinFailed))
    }

    fn status(&self) -> TerminationStatus {
        self.context.status()
    }

    fn usage(&self) -> ResourceUsage {
        self.context.usage()
    }

    fn peak_rss_kb(&self) -> u64 {
        self.context.peak_rss_kb()
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySize;

    #[test]
    fn test_memory_size_to_bytes() {
        assert_eq!(2, MemorySize::Bytes(2).bytes());
        assert_eq!(2 * 1024, MemorySize::KiloBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024, MemorySize::MegaBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024 * 1024, MemorySize::GigaBytes(2).bytes());
    }

    #[test]
    fn test_memory_size_ordering() {
        assert!(MemorySize::MegaBytes(1) > MemorySize::KiloBytes(1));
        assert_eq!(MemorySize::KiloBytes(1024), MemorySize::MegaBytes(1));
    }
}
