//! Locating the executable to run.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve `program` to an executable path.
///
/// Anything containing a path separator is treated as a path, relative to
/// `cwd`. A bare name is first tried as a file in `cwd`, then looked up on
/// `PATH`.
pub fn resolve_executable(program: &str, cwd: &Path) -> Result<PathBuf> {
    if program.is_empty() {
        return Err(Error::invalid_argument("command must not be empty"));
    }

    let candidate = cwd.join(program);
    if program.contains(std::path::MAIN_SEPARATOR) {
        return check_candidate(program, candidate);
    }
    if candidate.is_file() && is_executable(&candidate) {
        tracing::debug!(path = %candidate.display(), "using command from working directory");
        return Ok(candidate);
    }

    let path_var = std::env::var_os("PATH");
    match which::which_in(program, path_var, cwd) {
        Ok(found) => {
            tracing::debug!(path = %found.display(), "found command on PATH");
            Ok(found)
        }
        Err(e) => {
            tracing::debug!(program, "PATH lookup failed: {e}");
            Err(Error::CommandNotFound {
                program: program.to_string(),
            })
        }
    }
}

fn check_candidate(program: &str, path: PathBuf) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::CommandNotFound {
            program: program.to_string(),
        });
    }
    if path.is_dir() || !is_executable(&path) {
        return Err(Error::NotExecutable { path });
    }
    Ok(path)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
