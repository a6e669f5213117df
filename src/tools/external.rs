use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code reported when the process could not be started or awaited
pub const SPAWN_FAILED: i32 = -1;
/// Exit code reported when the process outlived its timeout and was killed
pub const TIMED_OUT: i32 = -2;
/// Exit code reported when the process was terminated by a signal
pub const KILLED_BY_SIGNAL: i32 = -3;

/// Default timeout for invocations that don't set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// An external binary and the ordered places to look for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub candidates: Vec<PathBuf>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            name: name.into(),
            candidates: candidates.into_iter().collect(),
        }
    }

    /// First candidate that exists
    ///
    /// Candidates with a directory part are checked as paths; bare names are
    /// looked up on `PATH`.
    pub fn resolve(&self) -> Option<PathBuf> {
        self.candidates.iter().find_map(|candidate| {
            if candidate.components().count() > 1 || candidate.is_absolute() {
                candidate.is_file().then(|| candidate.clone())
            } else {
                search_path(candidate)
            }
        })
    }

    pub fn searched(&self) -> String {
        self.candidates
            .iter()
            .map(|c| c.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn search_path(name: &Path) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// One fully described child-process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Human-readable label used in logs
    pub description: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables layered over the inherited environment
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(
        description: impl Into<String>,
        program: impl Into<PathBuf>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            description: description.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Value following `flag` in the argument list
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a child-process run
///
/// Every run ends in this shape, including runs that never started. Real
/// exit codes are non-negative; the negative sentinels mark outcomes that
/// are not process exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self::exited(0, stdout, "")
    }

    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::exited(SPAWN_FAILED, "", message)
    }

    pub fn timed_out_after(timeout: Duration) -> Self {
        Self::exited(
            TIMED_OUT,
            "",
            format!("Timed out after {}s", timeout.as_secs()),
        )
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMED_OUT
    }

    /// stdout followed by stderr
    pub fn combined_logs(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}
