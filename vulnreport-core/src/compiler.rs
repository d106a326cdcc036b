//! Compilation supervisor: sandboxed invocation of the typesetting toolchain
//!
//! Each job runs in its own freshly allocated, owner-only workspace and is
//! bounded by a wall-clock timeout. The supervisor never errors across its
//! boundary: every outcome, including timeout and toolchain failure, comes
//! back as a [`CompilationResult`] so callers can log or retry.
//!
//! Job lifecycle: Idle -> WorkspacePrepared -> ToolchainRunning ->
//! {Succeeded | Failed | TimedOut} -> WorkspaceReclaimed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::escape::escape;

/// Rendered source filename inside a workspace
const SOURCE_NAME: &str = "report.tex";
/// Toolchain output filename inside a workspace
const ARTIFACT_NAME: &str = "report.pdf";
/// Maximum toolchain diagnostic length surfaced to callers
const MAX_DIAGNOSTIC_LEN: usize = 4096;

/// Terminal status of a compilation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl std::fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileStatus::Succeeded => write!(f, "succeeded"),
            CompileStatus::Failed => write!(f, "failed"),
            CompileStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Outcome of one compilation job. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub status: CompileStatus,
    /// Final artifact path; present only on success
    pub artifact: Option<PathBuf>,
    /// Diagnostic message; present only on failure, already escaped
    pub diagnostic: Option<String>,
    /// Wall-clock time spent on the job
    pub elapsed: Duration,
    /// Artifact size in bytes, when available
    pub artifact_bytes: Option<u64>,
}

impl CompilationResult {
    pub(crate) fn succeeded(
        artifact: PathBuf,
        artifact_bytes: Option<u64>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: CompileStatus::Succeeded,
            artifact: Some(artifact),
            diagnostic: None,
            elapsed,
            artifact_bytes,
        }
    }

    /// Failure with a diagnostic that may echo attacker-influenced toolchain
    /// output; the message is escaped here, at the boundary.
    fn failed(raw_diagnostic: &str, elapsed: Duration) -> Self {
        Self {
            status: CompileStatus::Failed,
            artifact: None,
            diagnostic: Some(escape(&tail(raw_diagnostic, MAX_DIAGNOSTIC_LEN))),
            elapsed,
            artifact_bytes: None,
        }
    }

    fn timed_out(budget: Duration, elapsed: Duration) -> Self {
        Self {
            status: CompileStatus::TimedOut,
            artifact: None,
            diagnostic: Some(format!(
                "toolchain exceeded the {}s compilation budget",
                budget.as_secs()
            )),
            elapsed,
            artifact_bytes: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Succeeded
    }
}

/// Per-job isolated directory, removed on drop unless kept for debugging.
struct Workspace {
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Allocate a uniquely named directory under `root` with owner-only
    /// permissions and write the rendered source into it.
    fn prepare(root: &Path, job_name: &str, rendered: &str, keep: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let path = root.join(format!("{}-{}", sanitize(job_name), Uuid::new_v4()));
        // Created owner-only from the start; chmod-after-create would leave
        // a window where the directory is readable under the default umask.
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new().mode(0o700).create(&path)?;
        }
        #[cfg(not(unix))]
        std::fs::create_dir(&path)?;

        std::fs::write(path.join(SOURCE_NAME), rendered)?;
        debug!("prepared workspace {}", path.display());
        Ok(Self { path, keep })
    }

    fn source(&self) -> PathBuf {
        self.path.join(SOURCE_NAME)
    }

    fn artifact(&self) -> PathBuf {
        self.path.join(ARTIFACT_NAME)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            info!("keeping workspace {}", self.path.display());
            return;
        }
        // Reclamation is attempted on every exit path; its failure must
        // never mask the job result.
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("failed to reclaim workspace {}: {}", self.path.display(), e);
        }
    }
}

/// Supervises toolchain child processes for compilation jobs.
///
/// Holds only configuration; `compile` calls are independent and safe to
/// run concurrently, each against its own workspace.
pub struct Supervisor {
    config: EngineConfig,
}

impl Supervisor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Check that the toolchain binary runs at all (`--version`).
    pub async fn toolchain_available(&self) -> bool {
        let mut probe = Command::new(&self.config.toolchain_binary);
        probe
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        matches!(
            tokio::time::timeout(Duration::from_secs(10), probe.status()).await,
            Ok(Ok(status)) if status.success()
        )
    }

    /// Compile `rendered` source and deliver the artifact to `destination`.
    pub async fn compile(
        &self,
        rendered: &str,
        job_name: &str,
        destination: &Path,
    ) -> CompilationResult {
        let budget = Duration::from_secs(self.config.timeout_secs);
        let start = Instant::now();

        let workspace = match Workspace::prepare(
            &self.config.workspace_root,
            job_name,
            rendered,
            self.config.keep_workspaces,
        ) {
            Ok(ws) => ws,
            Err(e) => {
                return CompilationResult::failed(
                    &format!("workspace preparation failed: {e}"),
                    start.elapsed(),
                );
            }
        };

        debug!(
            "compiling {} with {} (budget {}s)",
            workspace.source().display(),
            self.config.toolchain_binary,
            budget.as_secs()
        );

        let mut command = Command::new(&self.config.toolchain_binary);
        command
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-no-shell-escape")
            .arg(format!("-output-directory={}", workspace.path.display()))
            .arg(SOURCE_NAME)
            .current_dir(&workspace.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The toolchain leads its own process group so a timeout can take
        // down helpers it spawned (latexmk, wrapper scripts), not just the
        // direct child.
        #[cfg(unix)]
        command.process_group(0);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CompilationResult::failed(
                    &format!("failed to spawn {}: {e}", self.config.toolchain_binary),
                    start.elapsed(),
                );
            }
        };
        let group_leader = child.id();

        // Dropping the wait future on timeout kills the direct child; the
        // rest of its process group is killed explicitly below.
        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return CompilationResult::failed(
                    &format!("toolchain wait failed: {e}"),
                    start.elapsed(),
                );
            }
            Err(_) => {
                kill_process_group(group_leader);
                warn!(
                    "compilation of '{}' timed out after {}s",
                    job_name,
                    budget.as_secs()
                );
                return CompilationResult::timed_out(budget, start.elapsed());
            }
        };

        let produced = workspace.artifact();
        if !output.status.success() || !produced.exists() {
            let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
            log.push_str(&String::from_utf8_lossy(&output.stderr));
            if log.trim().is_empty() {
                log = format!("toolchain exited with {} and no output", output.status);
            }
            return CompilationResult::failed(&log, start.elapsed());
        }

        match deliver(&produced, destination) {
            Ok(artifact_bytes) => {
                info!(
                    "compiled '{}' to {} in {:.2}s",
                    job_name,
                    destination.display(),
                    start.elapsed().as_secs_f64()
                );
                CompilationResult::succeeded(
                    destination.to_path_buf(),
                    artifact_bytes,
                    start.elapsed(),
                )
            }
            Err(e) => CompilationResult::failed(
                &format!("failed to deliver artifact to {}: {e}", destination.display()),
                start.elapsed(),
            ),
        }
    }
}

/// Copy the produced artifact to the caller's destination and return its
/// size. The destination is never world-writable.
fn deliver(produced: &Path, destination: &Path) -> std::io::Result<Option<u64>> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let bytes = std::fs::copy(produced, destination)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(destination, std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(Some(bytes))
}

/// SIGKILL every process in the group led by `leader`. The group was set up
/// at spawn, so this reaches descendants the toolchain forked.
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    let Some(pid) = leader else { return };
    let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH means the whole group already exited.
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("failed to kill process group {pid}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

/// Last `max` characters of a toolchain log; the tail is where the error is.
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

/// Restrict job names to filesystem-safe characters.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}
