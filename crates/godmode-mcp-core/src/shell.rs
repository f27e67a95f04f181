//! Shell resolution for launching job commands.
//!
//! Job commands are full command lines (pipes, redirects, `&&`), so they are
//! always handed to a shell rather than split into argv here.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A shell program plus the flag that makes it run a single command string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shell {
    /// Shell executable (e.g., "/bin/bash", "cmd.exe")
    pub program: String,
    /// Flag preceding the command string (e.g., "-c", "/C")
    pub command_flag: String,
}

impl Shell {
    /// Detect the default shell for the current platform.
    ///
    /// # Detection Logic
    ///
    /// - **Unix**: `/bin/bash` when present, otherwise `/bin/sh`
    /// - **Windows**: `cmd.exe /C`
    ///
    /// # Examples
    ///
    /// ```
    /// use godmode_mcp_core::Shell;
    ///
    /// let shell = Shell::detect();
    /// assert!(!shell.program.is_empty());
    /// ```
    pub fn detect() -> Self {
        #[cfg(windows)]
        {
            Self::from_program("cmd.exe")
        }

        #[cfg(not(windows))]
        {
            if Path::new("/bin/bash").exists() {
                Self::from_program("/bin/bash")
            } else {
                Self::from_program("/bin/sh")
            }
        }
    }

    /// Build a shell from an explicit program, inferring its command flag.
    pub fn from_program(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program)
            .to_ascii_lowercase();

        let command_flag = match name.as_str() {
            "cmd" | "cmd.exe" => "/C",
            "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => "-Command",
            _ => "-c",
        };

        Self {
            program: program.to_string(),
            command_flag: command_flag.to_string(),
        }
    }

    /// Resolve the shell from an optional configured program.
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured {
            Some(program) if !program.trim().is_empty() => Self::from_program(program.trim()),
            _ => Self::detect(),
        }
    }

    /// Arguments to pass to [`Shell::program`] to run `command`.
    pub fn command_args(&self, command: &str) -> Vec<String> {
        vec![self.command_flag.clone(), command.to_string()]
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::detect()
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.program, self.command_flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        let shell = Shell::detect();
        assert!(!shell.program.is_empty());
        assert!(!shell.command_flag.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_unix() {
        let shell = Shell::detect();
        assert!(shell.program == "/bin/bash" || shell.program == "/bin/sh");
        assert_eq!(shell.command_flag, "-c");
    }

    #[test]
    fn test_from_program_flags() {
        assert_eq!(Shell::from_program("/bin/zsh").command_flag, "-c");
        assert_eq!(Shell::from_program("cmd.exe").command_flag, "/C");
        assert_eq!(Shell::from_program("pwsh").command_flag, "-Command");
        assert_eq!(
            Shell::from_program("C:\\Windows\\System32\\CMD.EXE").command_flag,
            if cfg!(windows) { "/C" } else { "-c" }
        );
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Shell::resolve(Some("/bin/sh")).program, "/bin/sh");
        assert_eq!(Shell::resolve(Some("  ")), Shell::detect());
        assert_eq!(Shell::resolve(None), Shell::detect());
    }

    #[test]
    fn test_command_args() {
        let shell = Shell::from_program("/bin/sh");
        assert_eq!(shell.command_args("echo hi"), vec!["-c", "echo hi"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shell::from_program("/bin/sh")), "/bin/sh -c");
    }
}
