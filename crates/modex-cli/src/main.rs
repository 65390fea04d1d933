#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use modex_core::{paths, Config, VERSION};
use modex_host::{run_session, HostState};
use std::io;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "modex")]
#[command(author, version, about = "Native messaging host for the Python module explorer", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    json_logs: bool,

    /// Base directory for the registry and environments
    #[arg(long, env = paths::HOME_ENV, value_name = "PATH")]
    home: Option<PathBuf>,

    /// Interpreter used to create new environments
    #[arg(long, env = paths::PYTHON_ENV, value_name = "PATH")]
    python: Option<PathBuf>,

    /// Parent window handle passed by Chrome on Windows
    #[arg(long, hide = true, value_name = "HANDLE")]
    parent_window: Option<String>,

    /// Caller identification appended by the browser (origin, manifest path, extension id)
    #[arg(hide = true)]
    caller: Vec<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default()
            .with_verbosity(self.verbose)
            .with_json_logs(self.json_logs);
        if let Some(home) = &self.home {
            config.home.clone_from(home);
        }
        if let Some(python) = &self.python {
            config = config.with_python(python.clone());
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config();

    logging::init(&config);

    let mut state = HostState::from_config(&config).into_diagnostic()?;
    info!(
        version = VERSION,
        home = %state.registry.home().display(),
        python = %state.runner.python().display(),
        caller = ?cli.caller,
        "modex host starting"
    );

    let mut reader = io::stdin().lock();
    let mut writer = io::stdout().lock();

    if let Err(e) = run_session(&mut reader, &mut writer, &mut state) {
        error!(error = %e, "protocol error, ending session");
        return Err(e).into_diagnostic();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_browser_caller_arguments() {
        let cli = Cli::try_parse_from([
            "modex",
            "chrome-extension://abcdefghijklmnop/",
            "--parent-window=0",
        ])
        .unwrap();
        assert_eq!(cli.caller, vec!["chrome-extension://abcdefghijklmnop/"]);
        assert_eq!(cli.parent_window.as_deref(), Some("0"));
    }

    #[test]
    fn test_firefox_caller_arguments() {
        let cli = Cli::try_parse_from([
            "modex",
            "/usr/lib/mozilla/native-messaging-hosts/modex.json",
            "modex@example.org",
        ])
        .unwrap();
        assert_eq!(cli.caller.len(), 2);
    }

    #[test]
    fn test_env_overrides_use_core_names() {
        use clap::CommandFactory;
        use std::ffi::OsString;

        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|arg| arg.get_id().as_str() == id)
                .and_then(|arg| arg.get_env())
                .map(std::ffi::OsStr::to_os_string)
        };

        assert_eq!(env_of("home"), Some(OsString::from(paths::HOME_ENV)));
        assert_eq!(env_of("python"), Some(OsString::from(paths::PYTHON_ENV)));
    }

    #[test]
    fn test_home_and_python_flags() {
        let cli = Cli::try_parse_from([
            "modex",
            "--home",
            "/tmp/modex-home",
            "--python",
            "/usr/bin/python3",
            "-vv",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.home, PathBuf::from("/tmp/modex-home"));
        assert_eq!(config.python, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.verbosity, 2);
    }
}
