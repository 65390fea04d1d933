//! Collaborator process runner.
//!
//! Every external tool (the base interpreter creating environments, an
//! environment's `pip` and `python`) is invoked with an explicit argument
//! list and waited on synchronously. Introspection scripts are fixed
//! constants; module names travel as `argv` entries and search filtering
//! happens here, so request fields are never spliced into code.

use crate::error::{Error, Result};
use crate::paths;
use modex_proto::{InstalledPackage, ModuleAttribute, LATEST_VERSION};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Prints plain-text documentation for the module named by `argv[1]`.
const HELP_SCRIPT: &str = r"import contextlib, importlib, pydoc, sys
with contextlib.redirect_stdout(sys.stderr):
    module = importlib.import_module(sys.argv[1])
sys.stdout.write(pydoc.render_doc(module, renderer=pydoc.plaintext))
";

/// Prints a JSON list of `{name, type}` for the public attributes of `argv[1]`.
///
/// Import-time prints are redirected to stderr to keep stdout pure JSON.
const ATTRIBUTES_SCRIPT: &str = r"import contextlib, importlib, json, sys
with contextlib.redirect_stdout(sys.stderr):
    module = importlib.import_module(sys.argv[1])
attrs = []
for name in dir(module):
    if name.startswith('_'):
        continue
    try:
        kind = type(getattr(module, name)).__name__
    except Exception:
        continue
    attrs.append({'name': name, 'type': kind})
json.dump(attrs, sys.stdout)
";

/// Captured result of one collaborator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a program to completion and captures its output.
pub trait Executor {
    fn execute(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput>;
}

impl<F> Executor for F
where
    F: Fn(&Path, &[OsString]) -> io::Result<ToolOutput>,
{
    fn execute(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput> {
        self(program, args)
    }
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput> {
        // stdin is the protocol stream; children must not read from it
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Builds collaborator invocations and interprets their results.
pub struct ProcessRunner {
    python: PathBuf,
    executor: Box<dyn Executor>,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("python", &self.python)
            .field("executor", &"<dyn Executor>")
            .finish()
    }
}

impl ProcessRunner {
    /// Runner spawning real processes, creating environments with `python`.
    #[must_use]
    pub fn new(python: PathBuf) -> Self {
        Self::with_executor(python, SystemExecutor)
    }

    #[must_use]
    pub fn with_executor(python: PathBuf, executor: impl Executor + 'static) -> Self {
        Self {
            python,
            executor: Box::new(executor),
        }
    }

    /// Base interpreter used for environment creation.
    #[must_use]
    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Create a fresh environment at `path` with `python -m venv`.
    pub fn create_environment(&self, path: &Path) -> Result<()> {
        let args = vec![
            OsString::from("-m"),
            OsString::from("venv"),
            path.as_os_str().to_os_string(),
        ];
        self.run(&self.python, &args)?;
        Ok(())
    }

    /// Install `package` into the environment, pinned unless `version` is `"latest"`.
    pub fn install(&self, env: &Path, package: &str, version: &str) -> Result<InstalledPackage> {
        let spec = package_spec(package, version)?;
        let args = vec![OsString::from("install"), OsString::from(spec)];
        self.run(&paths::installer_path(env), &args)?;
        Ok(InstalledPackage {
            name: package.to_string(),
            version: version.to_string(),
        })
    }

    /// Documentation text for a module importable in the environment.
    pub fn module_help(&self, env: &Path, module: &str) -> Result<String> {
        validate_module_name(module)?;
        let output = self.run_script(env, HELP_SCRIPT, module)?;
        Ok(output.stdout)
    }

    /// Public attributes of a module with their runtime type names.
    pub fn module_attributes(&self, env: &Path, module: &str) -> Result<Vec<ModuleAttribute>> {
        validate_module_name(module)?;
        let program = paths::interpreter_path(env);
        let output = self.run_script(env, ATTRIBUTES_SCRIPT, module)?;
        serde_json::from_str(&output.stdout).map_err(|e| Error::InvalidOutput {
            program,
            reason: e.to_string(),
        })
    }

    /// Attributes whose names contain `query`, ignoring case.
    pub fn search_module_attributes(
        &self,
        env: &Path,
        module: &str,
        query: &str,
    ) -> Result<Vec<ModuleAttribute>> {
        let needle = query.to_lowercase();
        let mut attrs = self.module_attributes(env, module)?;
        attrs.retain(|attr| attr.name.to_lowercase().contains(&needle));
        Ok(attrs)
    }

    fn run_script(&self, env: &Path, script: &str, module: &str) -> Result<ToolOutput> {
        let args = vec![
            OsString::from("-c"),
            OsString::from(script),
            OsString::from(module),
        ];
        self.run(&paths::interpreter_path(env), &args)
    }

    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        debug!(program = %program.display(), ?args, "running collaborator");

        let output = self
            .executor
            .execute(program, args)
            .map_err(|source| Error::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        if !output.success() {
            warn!(
                program = %program.display(),
                exit_code = ?output.exit_code,
                "collaborator failed"
            );
            return Err(Error::ToolFailed {
                program: program.to_path_buf(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        debug!(program = %program.display(), "collaborator succeeded");
        Ok(output)
    }
}

/// Requirement string handed to the installer.
pub fn package_spec(package: &str, version: &str) -> Result<String> {
    if package.is_empty() || package.starts_with('-') {
        return Err(Error::invalid_name("package name", package));
    }
    if version == LATEST_VERSION {
        Ok(package.to_string())
    } else {
        Ok(format!("{package}=={version}"))
    }
}

fn validate_module_name(module: &str) -> Result<()> {
    let valid = !module.is_empty()
        && module.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_name("module name", module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(PathBuf, Vec<OsString>)>>>;

    fn recording(output: ToolOutput) -> (ProcessRunner, Calls) {
        let calls: Calls = Rc::default();
        let log = Rc::clone(&calls);
        let runner = ProcessRunner::with_executor(
            PathBuf::from("python3"),
            move |program: &Path, args: &[OsString]| -> io::Result<ToolOutput> {
                log.borrow_mut()
                    .push((program.to_path_buf(), args.to_vec()));
                Ok(output.clone())
            },
        );
        (runner, calls)
    }

    fn ok(stdout: &str) -> ToolOutput {
        ToolOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> ToolOutput {
        ToolOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_package_spec() {
        assert_eq!(package_spec("requests", "latest").unwrap(), "requests");
        assert_eq!(
            package_spec("requests", "2.31.0").unwrap(),
            "requests==2.31.0"
        );
        assert!(package_spec("", "latest").is_err());
        assert!(package_spec("--index-url=http://evil", "latest").is_err());
    }

    #[test]
    fn test_validate_module_name() {
        assert!(validate_module_name("json").is_ok());
        assert!(validate_module_name("os.path").is_ok());
        assert!(validate_module_name("_private").is_ok());
        assert!(validate_module_name("").is_err());
        assert!(validate_module_name("os;import shutil").is_err());
        assert!(validate_module_name("a..b").is_err());
    }

    #[test]
    fn test_create_environment_args() {
        let (runner, calls) = recording(ok(""));
        let target = Path::new("/home/u/modex/a");

        runner.create_environment(target).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls[0].0, PathBuf::from("python3"));
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("-m"),
                OsString::from("venv"),
                OsString::from("/home/u/modex/a")
            ]
        );
    }

    #[test]
    fn test_install_uses_environment_pip() {
        let (runner, calls) = recording(ok("Successfully installed six"));
        let env = Path::new("/home/u/modex/a");

        let installed = runner.install(env, "six", "1.16.0").unwrap();

        assert_eq!(installed.name, "six");
        assert_eq!(installed.version, "1.16.0");
        let calls = calls.borrow();
        assert_eq!(calls[0].0, paths::installer_path(env));
        assert_eq!(
            calls[0].1,
            vec![OsString::from("install"), OsString::from("six==1.16.0")]
        );
    }

    #[test]
    fn test_install_failure_surfaces_stderr() {
        let (runner, _) = recording(failed("ERROR: No matching distribution found for nope"));

        let err = runner
            .install(Path::new("/env"), "nope", "latest")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "ERROR: No matching distribution found for nope"
        );
    }

    #[test]
    fn test_module_name_passed_as_argument() {
        let (runner, calls) = recording(ok("Help on module json"));
        let env = Path::new("/env");

        let text = runner.module_help(env, "json").unwrap();

        assert_eq!(text, "Help on module json");
        let calls = calls.borrow();
        assert_eq!(calls[0].0, paths::interpreter_path(env));
        assert_eq!(calls[0].1[0], OsString::from("-c"));
        assert_eq!(calls[0].1[1], OsString::from(HELP_SCRIPT));
        assert_eq!(calls[0].1[2], OsString::from("json"));
    }

    #[test]
    fn test_invalid_module_name_not_spawned() {
        let (runner, calls) = recording(ok(""));

        let err = runner
            .module_attributes(Path::new("/env"), "os; rm -rf /")
            .unwrap_err();

        assert!(matches!(err, Error::InvalidName { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_module_attributes_parses_json() {
        let (runner, _) = recording(ok(
            r#"[{"name":"dumps","type":"function"},{"name":"JSONDecoder","type":"type"}]"#,
        ));

        let attrs = runner.module_attributes(Path::new("/env"), "json").unwrap();

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "dumps");
        assert_eq!(attrs[1].kind, "type");
    }

    #[test]
    fn test_module_attributes_rejects_non_json() {
        let (runner, _) = recording(ok("not json"));

        let err = runner
            .module_attributes(Path::new("/env"), "json")
            .unwrap_err();

        assert!(matches!(err, Error::InvalidOutput { .. }));
    }

    #[test]
    fn test_search_is_case_insensitive_on_names() {
        let (runner, calls) = recording(ok(
            r#"[{"name":"dumps","type":"function"},{"name":"JSONDecoder","type":"type"},{"name":"loads","type":"function"}]"#,
        ));

        let attrs = runner
            .search_module_attributes(Path::new("/env"), "json", "DEC")
            .unwrap();

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "JSONDecoder");
        // the query never reaches the interpreter
        assert!(calls.borrow()[0]
            .1
            .iter()
            .all(|arg| arg != &OsString::from("DEC")));
    }

    #[test]
    fn test_spawn_error() {
        let runner = ProcessRunner::with_executor(
            PathBuf::from("python3"),
            |_: &Path, _: &[OsString]| -> io::Result<ToolOutput> {
                Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
            },
        );

        let err = runner.create_environment(Path::new("/env")).unwrap_err();

        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.to_string().contains("python3"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_system_executor_captures_streams_and_exit_code() {
        let output = SystemExecutor
            .execute(
                Path::new("sh"),
                &[
                    OsString::from("-c"),
                    OsString::from("echo out; echo err >&2; exit 3"),
                ],
            )
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_system_executor_child_sees_closed_stdin() {
        let output = SystemExecutor
            .execute(
                Path::new("sh"),
                &[OsString::from("-c"), OsString::from("cat; echo done")],
            )
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "done\n");
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_real_failure_surfaces_stderr_verbatim() {
        let runner = ProcessRunner::new(PathBuf::from("sh"));
        let err = runner
            .run(
                Path::new("sh"),
                &[
                    OsString::from("-c"),
                    OsString::from("echo 'ERROR: boom' >&2; exit 1"),
                ],
            )
            .unwrap_err();

        assert!(matches!(err, Error::ToolFailed { exit_code: Some(1), .. }));
        assert_eq!(err.to_string(), "ERROR: boom\n");
    }

    /// Lay out `<env>/bin/python` as a wrapper around the host interpreter
    /// that can also import modules from `<env>/lib`.
    #[cfg(unix)]
    fn fake_environment(root: &Path, python: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let env = root.join("env");
        let lib = env.join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(
            lib.join("flaky.py"),
            r#"print("importing flaky")

ok_value = 1


def __getattr__(name):
    if name == "broken":
        raise RuntimeError("lookup failed")
    raise AttributeError(name)


def __dir__():
    return ["ok_value", "broken"]
"#,
        )
        .unwrap();

        let interpreter = paths::interpreter_path(&env);
        std::fs::create_dir_all(interpreter.parent().unwrap()).unwrap();
        std::fs::write(
            &interpreter,
            format!(
                "#!/bin/sh\nPYTHONPATH='{}' exec '{}' \"$@\"\n",
                lib.display(),
                python.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&interpreter, std::fs::Permissions::from_mode(0o755)).unwrap();
        env
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_scripts_on_real_interpreter() {
        let Ok(python) = which::which("python3") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let env = fake_environment(dir.path(), &python);
        let runner = ProcessRunner::new(python);

        let help = runner.module_help(&env, "json").unwrap();
        assert!(help.contains("json"), "unexpected help: {help}");

        // import-time output stays off stdout; the raising attribute is skipped
        let attrs = runner.module_attributes(&env, "flaky").unwrap();
        assert_eq!(
            attrs,
            vec![ModuleAttribute {
                name: "ok_value".to_string(),
                kind: "int".to_string(),
            }]
        );

        let err = runner
            .module_attributes(&env, "no_such_module_here")
            .unwrap_err();
        assert!(err.to_string().contains("ModuleNotFoundError"));
    }

    #[test]
    fn test_killed_process_is_failure() {
        let output = ToolOutput {
            exit_code: None,
            ..ToolOutput::default()
        };
        assert!(!output.success());
    }
}
