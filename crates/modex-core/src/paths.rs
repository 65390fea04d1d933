use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Environment variable to override the base directory.
pub const HOME_ENV: &str = "MODEX_HOME";

/// Environment variable to override the interpreter used to create environments.
pub const PYTHON_ENV: &str = "MODEX_PYTHON";

/// File name of the registry document inside the base directory.
pub const REGISTRY_FILE: &str = "venvs.json";

/// Get the default base directory holding the registry and all environments.
///
/// Uses platform-appropriate locations:
/// - Linux: `$XDG_DATA_HOME/modex` or `~/.local/share/modex`
/// - macOS: `~/Library/Application Support/modex`
/// - Windows: `%APPDATA%\modex`
///
/// Falls back to `~/.python_module_explorer` when no data directory is known.
#[must_use]
pub fn default_home() -> PathBuf {
    dirs_next::data_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".python_module_explorer"),
                |p| p.join(".python_module_explorer"),
            )
        },
        |p| p.join("modex"),
    )
}

/// Locate the base interpreter used to create new environments.
///
/// Prefers `python3` on `PATH`, then `python`. If neither is found the bare
/// name `python3` is returned and the spawn failure is reported per request.
#[must_use]
pub fn default_python() -> PathBuf {
    which::which("python3")
        .or_else(|_| which::which("python"))
        .unwrap_or_else(|_| PathBuf::from("python3"))
}

/// Path of the registry document for a base directory.
#[must_use]
pub fn registry_path(home: &Path) -> PathBuf {
    home.join(REGISTRY_FILE)
}

/// Resolve an environment location given relative to the base directory.
///
/// Rejects empty, absolute and parent-escaping paths so every environment
/// lives under `home`.
pub fn environment_path(home: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    let mut normal = 0usize;
    for component in rel.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath {
                    path: relative.to_string(),
                })
            }
        }
    }
    if normal == 0 {
        return Err(Error::InvalidPath {
            path: relative.to_string(),
        });
    }
    Ok(home.join(rel))
}

/// Directory holding an environment's executables.
#[must_use]
pub fn bin_dir(env: &Path) -> PathBuf {
    if cfg!(windows) {
        env.join("Scripts")
    } else {
        env.join("bin")
    }
}

/// The package installer inside an environment.
#[must_use]
pub fn installer_path(env: &Path) -> PathBuf {
    bin_dir(env).join(exe_name("pip"))
}

/// The interpreter inside an environment.
#[must_use]
pub fn interpreter_path(env: &Path) -> PathBuf {
    bin_dir(env).join(exe_name("python"))
}

fn exe_name(stem: &str) -> String {
    format!("{stem}{}", std::env::consts::EXE_SUFFIX)
}
