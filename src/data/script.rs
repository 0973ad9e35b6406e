//! Data modules as external scripts.
//!
//! A module is any script the configured runner can execute. It speaks JSON
//! over stdio:
//!
//! ```text
//! <runner> <module> describe            → {"global": [..], "per_page": [..]}
//! <runner> <module> global <name>       stdin {"data", "config"}         → {..}
//! <runner> <module> page <name> <page>  stdin {"data", "config", "page"} → {..}
//! ```
//!
//! A non-zero exit, invalid JSON or a non-object result is a failure of that
//! one call. Scripts run in the project root.

use super::module::{Contribution, ContributionKind, ModuleLoader};
use super::{Data, DataError, as_data};
use crate::compiler::Page;
use crate::config::SiteConfig;
use serde::{Deserialize, Serialize};
use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
    thread,
};

/// Lines of stderr kept in error messages.
const STDERR_LINES: usize = 5;

/// Names a module exports, by kind.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Manifest {
    global: Vec<String>,
    per_page: Vec<String>,
}

/// Payload written to a data function's stdin.
#[derive(Serialize)]
struct Request<'a> {
    data: &'a Data,
    config: &'a SiteConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<&'a str>,
}

/// How scripts are started.
#[derive(Debug)]
struct Runner {
    command: Vec<String>,
    cwd: PathBuf,
}

impl Runner {
    /// Run `module` with `args`, feeding `input` on stdin. Returns stdout.
    fn run(&self, module: &Path, args: &[&str], input: Vec<u8>) -> Result<Vec<u8>, String> {
        let (program, prefix) = self
            .command
            .split_first()
            .ok_or_else(|| "[data.runner] is empty".to_owned())?;

        let mut child = Command::new(program)
            .args(prefix)
            .arg(module)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn `{program}`: {e}"))?;

        // Written from another thread so a chatty script cannot fill its
        // stdout pipe while we block on stdin. Scripts may ignore stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                stdin.write_all(&input).ok();
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| format!("failed to wait for `{program}`: {e}"))?;
        if let Some(writer) = writer {
            writer.join().ok();
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<_> = stderr.lines().rev().take(STDERR_LINES).collect();
            let tail: Vec<_> = tail.into_iter().rev().collect();
            return Err(format!("exited with {}\n{}", output.status, tail.join("\n")));
        }
        Ok(output.stdout)
    }
}

/// Loads data modules by asking the script what it exports.
pub struct ScriptLoader {
    runner: Arc<Runner>,
}

impl ScriptLoader {
    pub fn new(config: &SiteConfig) -> Self {
        Self::with_runner(config.data.runner.clone(), config.get_root())
    }

    pub fn with_runner(command: Vec<String>, cwd: &Path) -> Self {
        Self {
            runner: Arc::new(Runner {
                command,
                cwd: cwd.to_path_buf(),
            }),
        }
    }
}

impl ModuleLoader for ScriptLoader {
    fn load(&self, module: &Path) -> Result<Vec<Box<dyn Contribution>>, DataError> {
        let failure = |message: String| DataError::Load {
            module: module.to_path_buf(),
            message,
        };

        let stdout = self.runner.run(module, &["describe"], Vec::new()).map_err(failure)?;
        let manifest: Manifest =
            serde_json::from_slice(&stdout).map_err(|e| failure(format!("invalid manifest: {e}")))?;

        let globals = manifest
            .global
            .into_iter()
            .map(|name| (name, ContributionKind::Global));
        let per_page = manifest
            .per_page
            .into_iter()
            .map(|name| (name, ContributionKind::PerPage));

        Ok(globals
            .chain(per_page)
            .map(|(name, kind)| {
                Box::new(ScriptFunction {
                    runner: Arc::clone(&self.runner),
                    module: module.to_path_buf(),
                    name,
                    kind,
                }) as Box<dyn Contribution>
            })
            .collect())
    }
}

/// One exported function of a script module.
struct ScriptFunction {
    runner: Arc<Runner>,
    module: PathBuf,
    name: String,
    kind: ContributionKind,
}

impl Contribution for ScriptFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ContributionKind {
        self.kind
    }

    fn call(&self, prev: &Data, config: &SiteConfig, page: Option<&Page>) -> Result<Data, DataError> {
        let failure = |message: String| DataError::Call {
            name: self.name.clone(),
            message,
        };

        let request = Request {
            data: prev,
            config,
            page: page.map(Page::name),
        };
        let input = serde_json::to_vec(&request).map_err(|e| failure(e.to_string()))?;

        let args: Vec<&str> = match page {
            Some(page) => vec!["page", self.name.as_str(), page.name()],
            None => vec!["global", self.name.as_str()],
        };
        let stdout = self.runner.run(&self.module, &args, input).map_err(failure)?;

        let value: serde_json::Value =
            serde_json::from_slice(&stdout).map_err(|e| failure(format!("invalid JSON output: {e}")))?;
        as_data(value).ok_or_else(|| failure("output is not a JSON object".into()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    const MODULE: &str = r#"
case "$1" in
  describe) echo '{"global": ["site"], "per_page": ["slug"]}' ;;
  global) echo '{"title": "Example"}' ;;
  page) echo "{\"slug\": \"$3\"}" ;;
esac
"#;

    fn setup(script: &str) -> (TempDir, PathBuf, ScriptLoader) {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("index.sh");
        fs::write(&module, script).unwrap();
        let loader = ScriptLoader::with_runner(vec!["sh".into()], dir.path());
        (dir, module, loader)
    }

    #[test]
    fn test_describe_registers_functions() {
        let (_dir, module, loader) = setup(MODULE);
        let functions = loader.load(&module).unwrap();

        let names: Vec<_> = functions.iter().map(|f| (f.name(), f.kind())).collect();
        assert_eq!(
            names,
            vec![
                ("site", ContributionKind::Global),
                ("slug", ContributionKind::PerPage)
            ]
        );
    }

    #[test]
    fn test_call_global_and_page() {
        let (_dir, module, loader) = setup(MODULE);
        let functions = loader.load(&module).unwrap();
        let config = SiteConfig::default();
        let page = Page::new("posts/a.html").unwrap();

        let global = functions[0].call(&Data::new(), &config, None).unwrap();
        assert_eq!(Value::Object(global), json!({"title": "Example"}));

        let per_page = functions[1].call(&Data::new(), &config, Some(&page)).unwrap();
        assert_eq!(Value::Object(per_page), json!({"slug": "posts/a.html"}));
    }

    #[test]
    fn test_request_reaches_stdin() {
        let script = r#"
case "$1" in
  describe) echo '{"global": ["echo"]}' ;;
  global) cat ;;
esac
"#;
        let (_dir, module, loader) = setup(script);
        let functions = loader.load(&module).unwrap();
        let prev = as_data(json!({"n": 1})).unwrap();

        let echoed = functions[0].call(&prev, &SiteConfig::default(), None).unwrap();
        assert_eq!(echoed.get("data"), Some(&json!({"n": 1})));
        assert_eq!(echoed["config"]["serve"]["port"], json!(8000));
    }

    #[test]
    fn test_failing_script() {
        let script = r#"
case "$1" in
  describe) echo '{"global": ["bad", "text"]}' ;;
  global)
    if [ "$2" = "bad" ]; then echo "kaboom" >&2; exit 3; fi
    echo 'not json' ;;
esac
"#;
        let (_dir, module, loader) = setup(script);
        let functions = loader.load(&module).unwrap();
        let config = SiteConfig::default();

        let err = functions[0].call(&Data::new(), &config, None).unwrap_err();
        assert!(err.to_string().contains("kaboom"));
        assert!(functions[1].call(&Data::new(), &config, None).is_err());
    }

    #[test]
    fn test_broken_module_fails_to_load() {
        let (_dir, module, loader) = setup("exit 1\n");
        assert!(matches!(loader.load(&module), Err(DataError::Load { .. })));

        let (_dir, module, loader) = setup("echo '\"nope\"'\n");
        assert!(matches!(loader.load(&module), Err(DataError::Load { .. })));
    }
}
