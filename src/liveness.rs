/// Process liveness probing.
///
/// One capability trait with a platform implementation chosen once by
/// `platform_probe()`: a signal probe on POSIX systems, a process-table lookup
/// on Windows, and `UnsupportedProbe` everywhere else.
use tracing::warn;

/// Answer from a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// A process with this identifier exists.
    Alive,
    /// No process with this identifier exists.
    Dead,
    /// The platform cannot tell. Callers must treat this as alive.
    Unknown,
}

/// Asks the operating system whether a process identifier is live.
pub trait LivenessProbe {
    fn probe(&self, pid: u32) -> Liveness;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// POSIX probe: `kill(pid, 0)` sends nothing but reports whether the target exists.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProbe;

#[cfg(unix)]
impl LivenessProbe for SignalProbe {
    fn probe(&self, pid: u32) -> Liveness {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // 0 and negative values address process groups, never a single process.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return Liveness::Unknown,
        };

        match kill(Pid::from_raw(raw), None) {
            Ok(()) => Liveness::Alive,
            // Exists, owned by someone else.
            Err(Errno::EPERM) => Liveness::Alive,
            Err(Errno::ESRCH) => Liveness::Dead,
            Err(e) => {
                warn!(pid, error = %e, "unexpected error probing process");
                Liveness::Unknown
            }
        }
    }

    fn name(&self) -> &'static str {
        "signal"
    }
}

/// Windows probe: looks the identifier up in the process table.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTableProbe;

#[cfg(windows)]
impl LivenessProbe for ProcessTableProbe {
    fn probe(&self, pid: u32) -> Liveness {
        let mut system = sysinfo::System::new();
        let pid = sysinfo::Pid::from_u32(pid);
        system.refresh_process(pid);
        if system.process(pid).is_some() {
            Liveness::Alive
        } else {
            Liveness::Dead
        }
    }

    fn name(&self) -> &'static str {
        "process-table"
    }
}

/// Fallback for platforms without a known liveness mechanism.
///
/// Always answers `Unknown`, which the supervisor reads as "already running".
/// A false refusal can be cleared by deleting the PID file by hand; a
/// duplicate instance cannot be undone.
#[cfg_attr(any(unix, windows), allow(dead_code))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProbe;

impl LivenessProbe for UnsupportedProbe {
    fn probe(&self, _pid: u32) -> Liveness {
        Liveness::Unknown
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

/// The probe for the platform this binary was built for.
#[cfg(unix)]
pub fn platform_probe() -> Box<dyn LivenessProbe> {
    Box::new(SignalProbe)
}

#[cfg(windows)]
pub fn platform_probe() -> Box<dyn LivenessProbe> {
    Box::new(ProcessTableProbe)
}

#[cfg(not(any(unix, windows)))]
pub fn platform_probe() -> Box<dyn LivenessProbe> {
    warn!("no process liveness check on this platform; existing pid files will block startup");
    Box::new(UnsupportedProbe)
}
