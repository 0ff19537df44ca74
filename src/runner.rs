use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use crate::model::config::BuildConfig;
use crate::model::diagnostic::{Diagnostic, parse_diagnostics};
use crate::msg::Msg;

/// Outcome of one build of the scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Raw stderr followed by stdout, or the spawn error.
    pub output: String,
}

/// Runs the configured compiler command over the source file.
#[derive(Debug, Clone)]
pub struct Runner {
    program: String,
    args: Vec<String>,
    build_dir: PathBuf,
}

impl Runner {
    pub fn new(config: &BuildConfig, build_dir: PathBuf) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            build_dir,
        }
    }

    /// The command line for `source`, with `{file}` and `{tmp}` filled in.
    pub fn command(&self, source: &Path) -> Command {
        let file = source.to_string_lossy();
        let tmp = self.build_dir.to_string_lossy();

        let mut command = Command::new(&self.program);
        command.args(
            self.args
                .iter()
                .map(|arg| arg.replace("{file}", &file).replace("{tmp}", &tmp)),
        );
        if let Some(dir) = source.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        command
    }

    /// Build synchronously.
    pub fn run(&self, source: &Path) -> BuildReport {
        if let Err(err) = std::fs::create_dir_all(&self.build_dir) {
            tracing::warn!("cannot create build dir {}: {err}", self.build_dir.display());
        }

        match self.command(source).output() {
            Ok(out) => {
                let mut output = String::from_utf8_lossy(&out.stderr).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stdout));
                BuildReport {
                    success: out.status.success(),
                    diagnostics: parse_diagnostics(&output),
                    output,
                }
            }
            Err(err) => {
                tracing::error!("failed to start {}: {err}", self.program);
                BuildReport {
                    success: false,
                    diagnostics: Vec::new(),
                    output: format!("failed to start {}: {err}", self.program),
                }
            }
        }
    }

    /// Build on a worker thread and report back through `tx`.
    pub fn spawn(&self, source: PathBuf, tx: mpsc::Sender<Msg>) {
        let runner = self.clone();
        thread::spawn(move || {
            tracing::info!("building {}", source.display());
            let report = runner.run(&source);
            tracing::info!(
                success = report.success,
                diagnostics = report.diagnostics.len(),
                "build finished"
            );
            let _ = tx.send(Msg::BuildFinished(report));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::diagnostic::Level;
    use pretty_assertions::assert_eq;

    fn runner(program: &str, args: &[&str], dir: &Path) -> Runner {
        let config = BuildConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        Runner::new(&config, dir.join("out"))
    }

    #[test]
    fn placeholders_are_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.rs");
        let runner = runner("rustc", &["--out-dir={tmp}", "{file}"], dir.path());

        let command = runner.command(&source);
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                format!("--out-dir={}", dir.path().join("out").display()),
                source.display().to_string(),
            ]
        );
    }

    #[test]
    fn missing_program_is_a_failed_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner("scratchpad-no-such-compiler", &[], dir.path());

        let report = runner.run(&dir.path().join("main.rs"));

        assert!(!report.success);
        assert!(report.diagnostics.is_empty());
        assert!(report.output.contains("scratchpad-no-such-compiler"));
    }

    #[cfg(unix)]
    #[test]
    fn diagnostics_come_from_command_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            "sh",
            &["-c", "echo '{file}:2:5: error[E0425]: nope' >&2; exit 1"],
            dir.path(),
        );

        let report = runner.run(&dir.path().join("main.rs"));

        assert!(!report.success);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].level, Level::Error);
        assert_eq!(report.diagnostics[0].line, 2);
    }

    #[cfg(unix)]
    #[test]
    fn spawn_reports_through_channel() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner("sh", &["-c", "exit 0"], dir.path());
        let (tx, rx) = mpsc::channel();

        runner.spawn(dir.path().join("main.rs"), tx);

        match rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap() {
            Msg::BuildFinished(report) => assert!(report.success),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
