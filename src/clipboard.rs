//! Clipboard access through user-configured commands (`wl-copy`, `xclip`,
//! `pbcopy`, ...).

use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::CommandExec;
use crate::error::ConvertError;

/// Pipe `value` into the copy command.
pub fn copy(command: Option<&CommandExec>, value: &str) -> Result<(), ConvertError> {
    let command = command.ok_or_else(|| {
        ConvertError::ClipboardAccess("copy command not configured".to_string())
    })?;

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| spawn_error(command, err))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(value.as_bytes())
            .map_err(|err| ConvertError::ClipboardAccess(err.to_string()))?;
    }

    let status = child
        .wait()
        .map_err(|err| ConvertError::ClipboardAccess(err.to_string()))?;
    if !status.success() {
        return Err(ConvertError::ClipboardAccess(format!(
            "`{}` exited with {}",
            command.program, status
        )));
    }
    Ok(())
}

/// Read the clipboard through the paste command.
pub fn paste(command: Option<&CommandExec>) -> Result<String, ConvertError> {
    let command = command.ok_or_else(|| {
        ConvertError::ClipboardAccess("paste command not configured".to_string())
    })?;

    let output = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| spawn_error(command, err))?;

    if !output.status.success() {
        return Err(ConvertError::ClipboardAccess(format!(
            "`{}` exited with {}",
            command.program, output.status
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| ConvertError::ClipboardAccess("clipboard is not UTF-8 text".to_string()))
}

fn spawn_error(command: &CommandExec, err: std::io::Error) -> ConvertError {
    ConvertError::ClipboardAccess(format!("failed to spawn `{}`: {}", command.program, err))
}
