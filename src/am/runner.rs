//! Subprocess execution.
//!
//! The client never spawns processes directly; it goes through
//! [`CommandRunner`] so the tool can be swapped for a scripted fake.

use std::collections::BTreeMap;
use std::io;
use std::process::{Command, Stdio};

/// Captured, trimmed output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().trim().to_string(),
            stderr: stderr.into().trim().to_string(),
        }
    }

    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self::new(stdout, "")
    }
}

/// Runs a full shell command line and returns what it printed.
pub trait CommandRunner {
    fn run(&self, command_line: &str) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command_line: &str) -> io::Result<CommandOutput> {
        (**self).run(command_line)
    }
}

/// Runs commands through `sh -c`, blocking until they exit.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    environment: BTreeMap<String, String>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command_line: &str) -> io::Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .envs(&self.environment)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput::new(
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::am::flags::CommandFlags;
    use tempfile::TempDir;

    #[test]
    fn test_output_is_trimmed() {
        let output = CommandOutput::new("\n  Successfully added Subnet 10.0.0.0/29\n", "\n");
        assert_eq!(output.stdout, "Successfully added Subnet 10.0.0.0/29");
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner_captures_both_streams() {
        let runner = ShellRunner::new().with_env("AM_TEST_VALUE", "42");
        let output = runner
            .run("echo \"value=$AM_TEST_VALUE\"; echo oops 1>&2")
            .unwrap();
        assert_eq!(output.stdout, "value=42");
        assert_eq!(output.stderr, "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_flag_values_are_not_executed_by_the_shell() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let hostname = format!("x;touch {};#", marker.display());
        let flags = CommandFlags::function("int-add")
            .text("name", hostname.as_str())
            .text("Descr", "branch 01");

        let output = ShellRunner::new()
            .run(&format!("printf '%s\\n' {}", flags))
            .unwrap();

        assert!(!marker.exists());
        assert_eq!(
            output.stdout,
            format!("-function=int-add\n-name={}\n-Descr=branch 01", hostname)
        );
    }
}
