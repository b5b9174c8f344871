//! Git integration.
//!
//! Provides the [`GitProbe`] seam the rest of the crate reads repository
//! state through, and [`SystemGit`], which answers it with `git2`
//! discovery plus a time-bounded `git` subprocess. Every failure (missing
//! binary, non-zero exit, timeout, not a repository) is reported as
//! absence rather than an error.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Default bound on a single git subprocess.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a running subprocess is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of running a git command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Whether git ran and exited zero within the timeout.
    pub success: bool,
    /// Captured stdout with trailing whitespace trimmed. Empty on failure.
    pub stdout: String,
}

impl GitOutput {
    /// A failed run.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Stdout if the command succeeded.
    pub fn ok(self) -> Option<String> {
        self.success.then_some(self.stdout)
    }
}

/// Read access to the live repository state.
pub trait GitProbe {
    /// Whether the working directory is inside a git repository.
    fn is_repo(&self) -> bool;

    /// The checked-out branch, or `None` outside a repository.
    fn current_branch(&self) -> Option<String>;

    /// Runs `git <args>` bounded by `timeout`. Never panics or errors.
    fn run(&self, args: &[&str], timeout: Duration) -> GitOutput;

    /// The timeout used by callers that do not pick their own.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

/// [`GitProbe`] backed by the local `git` installation.
#[derive(Debug, Clone)]
pub struct SystemGit {
    workdir: PathBuf,
    timeout: Duration,
}

impl SystemGit {
    /// Probes the repository containing `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Probes the process's current directory.
    pub fn current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().context("Could not determine current directory")?;
        Ok(Self::new(cwd))
    }

    /// Overrides the default subprocess timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitProbe for SystemGit {
    fn is_repo(&self) -> bool {
        git2::Repository::discover(&self.workdir).is_ok()
    }

    fn current_branch(&self) -> Option<String> {
        discover_branch(&self.workdir)
    }

    fn run(&self, args: &[&str], timeout: Duration) -> GitOutput {
        run_with_timeout(&self.workdir, args, timeout)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Spawns `git` in `cwd` and waits at most `timeout` for it to finish.
///
/// Stdout is drained on a helper thread so a chatty command cannot fill
/// the pipe and stall the poll loop. On timeout the child is killed.
fn run_with_timeout(cwd: &Path, args: &[&str], timeout: Duration) -> GitOutput {
    let spawned = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!("Failed to spawn git {args:?}: {e}");
            return GitOutput::failed();
        }
    };

    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if started.elapsed() >= timeout => {
                tracing::debug!("git {args:?} timed out after {timeout:?}");
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::debug!("Failed waiting for git {args:?}: {e}");
                break None;
            }
        }
    };

    let stdout = reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).trim_end().to_string())
        .unwrap_or_default();

    match status {
        Some(status) if status.success() => GitOutput {
            success: true,
            stdout,
        },
        _ => GitOutput::failed(),
    }
}

/// Branch checked out in the repository containing `path`.
///
/// A repository without commits reports the branch its first commit will
/// land on. Returns `None` outside a repository.
pub fn discover_branch(path: &Path) -> Option<String> {
    let repo = git2::Repository::discover(path).ok()?;
    let head = repo.head().ok();
    head.and_then(|h| h.shorthand().map(|s| s.to_string()))
        .or_else(|| unborn_branch(&repo))
}

/// Branch name of a repository with no commits yet.
fn unborn_branch(repo: &git2::Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    let target = head.symbolic_target()?;
    target.strip_prefix("refs/heads/").map(|s| s.to_string())
}

/// Extracts paths from `git status --porcelain` output.
///
/// Renames (`R  old -> new`) report the new path. Quoted paths are
/// decoded with [`unquote_path`].
pub fn parse_status_paths(porcelain: &str) -> Vec<String> {
    porcelain
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            unquote_path(path)
        })
        .collect()
}

/// Reverses git's C-style path quoting, e.g. `"caf\303\251.txt"` is
/// `café.txt`. Unquoted paths are returned as they are.
fn unquote_path(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let raw = inner.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 == raw.len() {
            bytes.push(raw[i]);
            i += 1;
            continue;
        }

        let octal = raw
            .get(i + 1..i + 4)
            .filter(|digits| digits.iter().all(|b| (b'0'..=b'7').contains(b)));
        if let Some(digits) = octal {
            let value = digits
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            bytes.push(value as u8);
            i += 4;
            continue;
        }

        bytes.push(match raw[i + 1] {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            other => other,
        });
        i += 2;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
