use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::error::{SponsrError, SponsrResult};

/// Locates an external tool.
///
/// An explicitly configured path must point to an existing file. Without one the
/// tool is looked up in `PATH`.
pub fn resolve_executable(name: &'static str, explicit: Option<&Path>) -> SponsrResult<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(SponsrError::ExecutableNotFound {
            name,
            path: path.to_path_buf(),
        }),
        None => {
            let path = which::which(name)?;
            tracing::debug!("Found {name} at {}", path.display());
            Ok(path)
        }
    }
}

/// Runs `program` with `args`, capturing both output streams.
///
/// A non-zero exit status is turned into [SponsrError::CommandFailed].
pub async fn run_command<I, S>(
    program: &Path,
    args: I,
    cwd: Option<&Path>,
) -> SponsrResult<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let command = std::iter::once(program.as_os_str())
            .chain(args.iter().map(|a| a.as_os_str()))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::error!("Command failed: {command}\n{stderr}");
        return Err(SponsrError::CommandFailed {
            command,
            status: output.status,
            stdout,
            stderr,
        });
    }

    Ok((stdout, stderr))
}
