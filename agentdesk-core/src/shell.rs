//! Shell command execution with a hard timeout.
//!
//! Output collection runs on a worker thread; the caller waits on a
//! channel with a deadline.  On timeout the child is abandoned rather
//! than killed -- by then it may hold state the desktop session depends
//! on, and the caller only asked for its output.

use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::errors::AgentDeskError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TIMEOUT_MESSAGE: &str = "Command execution timed out";

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-Command", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

/// Run `command` in the platform shell, returning `(output, exit_code)`.
///
/// stdout and stderr are concatenated in that order.  A command that
/// exceeds `timeout` yields a timeout message and exit code 1.
pub fn execute_command(
    command: &str,
    timeout: Duration,
) -> Result<(String, i32), AgentDeskError> {
    let command = command.to_owned();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let result = shell_command(&command)
            .output()
            .map(|output| {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                (text, output.status.code().unwrap_or(-1))
            })
            .map_err(|e| AgentDeskError::ShellError(format!("failed to spawn shell: {e}")));
        // Receiver gone means the caller timed out; nothing to report.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Ok((TIMEOUT_MESSAGE.to_owned(), 1)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AgentDeskError::ShellError(
            "shell worker exited without a result".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_exit_code() {
        let (output, code) = execute_command("echo hello", DEFAULT_TIMEOUT).unwrap();
        assert!(output.contains("hello"));
        assert_eq!(code, 0);
    }

    #[test]
    fn test_nonzero_exit_code() {
        let (_, code) = execute_command("exit 3", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn test_stderr_collected() {
        let (output, _) = execute_command("echo oops 1>&2", DEFAULT_TIMEOUT).unwrap();
        assert!(output.contains("oops"));
    }

    #[test]
    fn test_timeout() {
        let command = if cfg!(windows) {
            "Start-Sleep -Seconds 5"
        } else {
            "sleep 5"
        };
        let (output, code) = execute_command(command, Duration::from_millis(200)).unwrap();
        assert_eq!(output, TIMEOUT_MESSAGE);
        assert_eq!(code, 1);
    }
}
