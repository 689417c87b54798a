// Helper functions for backend implementations

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command as TokioCommand};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::errors::DownloadError;
use super::stream::MediaByteStream;

/// Lines of stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Bounded retry with capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "[{}] attempt {}/{} failed ({}), retrying in {:?}",
                    label, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn spawn_error(program: &str, e: io::Error) -> DownloadError {
    if e.kind() == io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e))
    }
}

/// Run command with timeout; the child is killed if the timeout fires or the
/// caller's future is dropped.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = timeout(Duration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res.map_err(|e| {
                DownloadError::ExecutionError(format!("Failed to wait for {}: {}", program, e))
            })?;
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            warn!("{} timed out after {}s, killed", program, timeout_secs);
            Err(DownloadError::NetworkTimeout)
        }
    }
}

async fn join_pipe(
    task: JoinHandle<io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("{} task failed: {}", name, e)))?
        .map_err(|e| DownloadError::ExecutionError(format!("Failed to read {}: {}", name, e)))
}

/// One process of a streaming pipeline.
#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub program: String,
    pub args: Vec<String>,
}

impl PipelineStage {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Spawn `stages` with each stdout piped into the next stdin and expose the
/// last stdout as a [`MediaByteStream`].
///
/// After the last byte, every exit status is checked; a failed stage turns
/// into a trailing `Err` item carrying the end of its stderr. Releasing the
/// stream kills every stage.
pub fn spawn_media_pipeline(stages: Vec<PipelineStage>) -> Result<MediaByteStream, DownloadError> {
    let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    let mut children: Vec<(String, Child)> = Vec::with_capacity(stages.len());
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut upstream = None;

    for stage in stages {
        debug!("[pipeline] spawning {} {}", stage.program, stage.args.join(" "));

        let mut cmd = TokioCommand::new(&stage.program);
        cmd.args(&stage.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.stdin(if upstream.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| spawn_error(&stage.program, e))?;

        if let Some(mut source) = upstream.take() {
            let mut sink = child.stdin.take().ok_or_else(|| {
                DownloadError::ExecutionError(format!("Failed to open stdin of {}", stage.program))
            })?;
            let program = stage.program.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = tokio::io::copy(&mut source, &mut sink).await {
                    debug!("[pipeline] pipe into {} closed: {}", program, e);
                }
            }));
        }

        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(drain_stderr(
                stage.program.clone(),
                stderr,
                Arc::clone(&stderr_tail),
            )));
        }

        upstream = child.stdout.take();
        children.push((stage.program, child));
    }

    let stdout = upstream
        .ok_or_else(|| DownloadError::ExecutionError("Empty media pipeline".to_string()))?;

    let children = Arc::new(Mutex::new(children));

    let exit_children = Arc::clone(&children);
    let exit_tail = Arc::clone(&stderr_tail);
    let exit_check = futures::stream::once(async move {
        let finished = std::mem::take(&mut *exit_children.lock());
        for (program, mut child) in finished {
            let status = child.wait().await?;
            if !status.success() {
                let tail: Vec<String> = exit_tail.lock().iter().cloned().collect();
                return Err(io::Error::other(format!(
                    "{} exited with {}: {}",
                    program,
                    status,
                    tail.join("\n")
                )));
            }
        }
        Ok::<(), io::Error>(())
    })
    .filter_map(|result| futures::future::ready(result.err().map(Err::<Bytes, io::Error>)));

    let body = ReaderStream::new(stdout).chain(exit_check);

    Ok(MediaByteStream::new(body).with_release(move || {
        for (program, child) in children.lock().iter_mut() {
            if let Err(e) = child.start_kill() {
                debug!("[pipeline] {} already gone: {}", program, e);
            }
        }
        for task in tasks {
            task.abort();
        }
    }))
}

async fn drain_stderr(program: String, stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[{}] {}", program, line);
        let mut tail = tail.lock();
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}
