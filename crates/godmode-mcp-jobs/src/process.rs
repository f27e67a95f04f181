//! Child process launching and termination.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, error, info};

use godmode_mcp_core::{Error, Result, Shell};

/// What to launch: a program, its arguments and an optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory (None = inherit)
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Run `command` through `shell`.
    pub fn shell(shell: &Shell, command: &str, cwd: Option<&str>) -> Self {
        Self {
            program: shell.program.clone(),
            args: shell.command_args(command),
            cwd: cwd.map(PathBuf::from),
        }
    }
}

/// Handle to a spawned job process.
///
/// On Unix the process leads its own process group so that stopping a job
/// also reaches anything the shell spawned.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// Spawn a process with piped stdout/stderr and a closed stdin.
    pub fn spawn(spec: &CommandSpec) -> Result<Self> {
        debug!(
            "Spawning process: program='{}' args={:?}, cwd={:?}",
            spec.program, spec.args, spec.cwd
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn '{}': {}", spec.program, e);
            Error::LaunchFailure(format!("{}: {e}", spec.program))
        })?;

        let pid = child.id();
        info!("Process spawned: program='{}', pid={:?}", spec.program, pid);

        Ok(Self { child, pid })
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the stdout pipe (only once).
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe (only once).
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// A handle that can signal this process without borrowing it.
    pub fn killer(&self) -> ProcessKiller {
        ProcessKiller { pid: self.pid }
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Cancel safe: dropping the future does not lose the exit status.
    pub async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }
}

/// Sends termination signals to a job's process group.
#[derive(Debug, Clone, Copy)]
pub struct ProcessKiller {
    pid: Option<u32>,
}

impl ProcessKiller {
    /// Ask the process to terminate (`force = false`) or kill it outright.
    ///
    /// A process that already exited is not an error.
    #[cfg(unix)]
    pub fn terminate(&self, force: bool) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let signal = if force { libc::SIGKILL } else { libc::SIGTERM };

        debug!("Signalling process group: pgid={}, signal={}", pid, signal);
        let rc = unsafe { libc::killpg(pid as libc::pid_t, signal) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Ask the process to terminate (Windows implementation).
    #[cfg(windows)]
    pub fn terminate(&self, force: bool) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str(), "/T"];
        if force {
            args.push("/F");
        }
        std::process::Command::new("taskkill").args(&args).output()?;
        Ok(())
    }
}

/// Exit code for a finished process; signal deaths map to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    godmode_mcp_core::LAUNCH_FAILURE_EXIT_CODE
}
