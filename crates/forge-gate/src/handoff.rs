//! Handing control to the main process.

use std::process::Command;

use tracing::info;

use crate::error::{GateError, GateResult};

pub trait Handoff {
    /// Transfer control to `command`. A real handoff does not return on
    /// success.
    fn handoff(&mut self, command: &[String]) -> GateResult<()>;
}

/// Replaces the current process image, so the gate does not stay
/// resident.
#[derive(Debug, Default)]
pub struct ExecHandoff;

impl Handoff for ExecHandoff {
    fn handoff(&mut self, command: &[String]) -> GateResult<()> {
        let (program, args) = command.split_first().ok_or(GateError::EmptyCommand)?;
        info!(command = %command.join(" "), "handing off");
        let mut cmd = Command::new(program);
        cmd.args(args);
        Err(GateError::Exec {
            command: program.clone(),
            source: exec(cmd),
        })
    }
}

#[cfg(unix)]
fn exec(mut cmd: Command) -> std::io::Error {
    use std::os::unix::process::CommandExt;
    cmd.exec()
}

/// Without `exec`, run the command to completion and exit with its code.
#[cfg(not(unix))]
fn exec(mut cmd: Command) -> std::io::Error {
    match cmd.status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_exec_failure() {
        let err = ExecHandoff
            .handoff(&["/nonexistent/forge-main".to_string()])
            .unwrap_err();
        assert!(matches!(err, GateError::Exec { command, .. } if command == "/nonexistent/forge-main"));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(ExecHandoff.handoff(&[]), Err(GateError::EmptyCommand)));
    }
}
