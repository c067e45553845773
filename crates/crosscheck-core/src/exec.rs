//! Sandboxed external process execution.
//!
//! The runner spawns a fixed PATH-resolved command with a scrubbed
//! environment, a wall-clock timeout, capped stdout/stderr capture, and a
//! broadcast cancellation signal. It never interprets child output; it
//! only returns bytes. No shell is involved at any point; the argument
//! screen is defense-in-depth documenting that intent.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::ExecError;

/// Shell metacharacters rejected in non-path arguments.
const METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '{', '}', '[', ']', '<', '>', '*', '?', '~',
];

/// Metacharacters rejected even in path-shaped arguments.
const PATH_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '<', '>'];

/// One external invocation: a fixed program identifier plus validated
/// arguments. `program` is looked up via PATH only.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: &'static str,
    pub args: Vec<String>,
    /// Canonical working directory (validated upstream).
    pub cwd: PathBuf,
    pub timeout: Duration,
    /// Environment entries set explicitly (name, value).
    pub env: Vec<(String, String)>,
    /// Variable names inherited from the parent when present.
    pub env_passthrough: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: &'static str, args: Vec<String>, cwd: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            args,
            cwd,
            timeout,
            env: Vec::new(),
            env_passthrough: Vec::new(),
            stdin: None,
        }
    }
}

/// What came back from one child process.
#[derive(Debug)]
pub struct ExecOutcome {
    /// None when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_time: Duration,
    pub timed_out: bool,
}

/// Re-entrant process runner shared by all adapter tasks.
#[derive(Debug, Clone)]
pub struct SandboxedRunner {
    stream_cap_bytes: usize,
    grace: Duration,
    cancel: watch::Receiver<bool>,
}

impl SandboxedRunner {
    pub const DEFAULT_STREAM_CAP: usize = 16 * 1024 * 1024;
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self {
            stream_cap_bytes: Self::DEFAULT_STREAM_CAP,
            grace: Self::DEFAULT_GRACE,
            cancel,
        }
    }

    pub fn with_stream_cap(mut self, cap_bytes: usize) -> Self {
        self.stream_cap_bytes = cap_bytes;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run the command to completion, timeout, or cancellation.
    ///
    /// A timed-out child yields `Ok` with `timed_out = true`; the adapter
    /// owns the decision to surface that as an error.
    pub async fn run(&self, spec: &CommandSpec) -> Result<ExecOutcome, ExecError> {
        for arg in &spec.args {
            screen_argument(arg)?;
        }

        let mut command = Command::new(spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .env_clear()
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Environment built from scratch: PATH plus declared passthrough.
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        for name in &spec.env_passthrough {
            if let Some(value) = std::env::var_os(name) {
                command.env(name, value);
            }
        }
        for (name, value) in &spec.env {
            command.env(name, value);
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|err| ExecError::SpawnFailed {
            program: spec.program.to_string(),
            source: err,
        })?;

        tracing::debug!(
            program = spec.program,
            args = ?spec.args,
            cwd = %spec.cwd.display(),
            timeout_ms = spec.timeout.as_millis() as u64,
            "spawned external tool"
        );

        if let (Some(mut stdin), Some(bytes)) = (child.stdin.take(), spec.stdin.clone()) {
            tokio::spawn(async move {
                let _ = stdin.write_all(&bytes).await;
                let _ = stdin.shutdown().await;
            });
        }

        let (overflow_tx, mut overflow_rx) = mpsc::channel::<&'static str>(2);
        let stdout_task = capture_stream(
            child.stdout.take(),
            "stdout",
            self.stream_cap_bytes,
            overflow_tx.clone(),
        );
        let stderr_task = capture_stream(
            child.stderr.take(),
            "stderr",
            self.stream_cap_bytes,
            overflow_tx,
        );

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            loop {
                if *cancel.borrow() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // Sender gone; cancellation can no longer arrive.
                    std::future::pending::<()>().await;
                }
            }
        };
        let deadline = tokio::time::sleep(spec.timeout);
        tokio::pin!(deadline);
        tokio::pin!(cancelled);

        let (exit_code, timed_out) = tokio::select! {
            status = child.wait() => {
                let status = status?;
                (status.code(), false)
            }
            _ = &mut deadline => {
                tracing::warn!(program = spec.program, "wall-clock timeout, terminating child");
                self.terminate(&mut child).await;
                (None, true)
            }
            _ = &mut cancelled => {
                self.terminate(&mut child).await;
                return Err(ExecError::Cancelled);
            }
            Some(stream) = overflow_rx.recv() => {
                self.terminate(&mut child).await;
                // Drain capture tasks before reporting.
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                return Err(ExecError::OutputOverflow {
                    stream,
                    cap_bytes: self.stream_cap_bytes,
                });
            }
        };

        let stdout = stdout_task.await.map_err(|_| ExecError::CaptureFailed)?;
        let stderr = stderr_task.await.map_err(|_| ExecError::CaptureFailed)?;

        // The child can exit before the select polls the overflow channel;
        // a pending message still means truncated output. Timeouts keep
        // their own error, the kill truncates output anyway.
        if !timed_out {
            if let Ok(stream) = overflow_rx.try_recv() {
                return Err(ExecError::OutputOverflow {
                    stream,
                    cap_bytes: self.stream_cap_bytes,
                });
            }
        }

        Ok(ExecOutcome {
            exit_code,
            stdout,
            stderr,
            wall_time: start.elapsed(),
            timed_out,
        })
    }

    /// Two-step termination: ask first, force after the grace window.
    async fn terminate(&self, child: &mut Child) {
        let _ = child.start_kill();
        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = child.kill().await;
            }
        }
    }
}

/// Reject arguments carrying shell metacharacters. Path-shaped arguments
/// (absolute or explicitly project-relative) get the narrower screen so
/// legitimate globs-free paths with `~` or brackets in names still fail
/// closed on the dangerous set.
pub fn screen_argument(arg: &str) -> Result<(), ExecError> {
    let screen: &[char] = if arg.starts_with('/') || arg.starts_with("./") {
        PATH_METACHARACTERS
    } else {
        METACHARACTERS
    };
    if arg.contains(screen) {
        return Err(ExecError::ForbiddenArgument {
            arg: arg.to_string(),
        });
    }
    Ok(())
}

fn capture_stream<R>(
    stream: Option<R>,
    name: &'static str,
    cap_bytes: usize,
    overflow: mpsc::Sender<&'static str>,
) -> JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let Some(mut stream) = stream else {
            return buf;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if buf.len() + n > cap_bytes {
                        let _ = overflow.send(name).await;
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        }
        buf
    })
}

/// Convenience for building a cancellation pair.
pub fn cancellation_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> SandboxedRunner {
        let (_tx, rx) = cancellation_channel();
        SandboxedRunner::new(rx)
    }

    fn spec(program: &'static str, args: &[&str], timeout: Duration) -> CommandSpec {
        CommandSpec::new(
            program,
            args.iter().map(|s| s.to_string()).collect(),
            std::env::temp_dir(),
            timeout,
        )
    }

    #[tokio::test]
    async fn captures_stdout() {
        let outcome = runner()
            .run(&spec("echo", &["hello"], Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(String::from_utf8_lossy(&outcome.stdout).trim(), "hello");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn reports_timeout() {
        let outcome = runner()
            .run(&spec("sleep", &["5"], Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert!(outcome.wall_time >= Duration::from_millis(200));
        assert!(outcome.wall_time < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let err = runner()
            .run(&spec(
                "definitely-not-a-real-tool-xyz",
                &[],
                Duration::from_secs(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn stdin_round_trips() {
        let mut spec = spec("cat", &[], Duration::from_secs(5));
        spec.stdin = Some(b"piped bytes".to_vec());
        let outcome = runner().run(&spec).await.unwrap();
        assert_eq!(outcome.stdout, b"piped bytes");
    }

    #[tokio::test]
    async fn output_overflow_terminates_child() {
        let mut spec = spec("cat", &[], Duration::from_secs(5));
        spec.stdin = Some(vec![b'x'; 4096]);
        let runner = runner().with_stream_cap(1024);
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::OutputOverflow {
                stream: "stdout",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn overflow_from_a_fast_exiting_child_is_still_reported() {
        // The child writes past the cap and exits immediately, so the
        // wait arm can win the select before the overflow message lands.
        let runner = runner().with_stream_cap(1024);
        for _ in 0..20 {
            let err = runner
                .run(&spec(
                    "head",
                    &["-c", "65536", "/dev/zero"],
                    Duration::from_secs(5),
                ))
                .await
                .unwrap_err();
            assert!(matches!(err, ExecError::OutputOverflow { .. }));
        }
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let (tx, rx) = cancellation_channel();
        let runner = SandboxedRunner::new(rx);
        let handle = tokio::spawn(async move {
            runner
                .run(&CommandSpec::new(
                    "sleep",
                    vec!["5".into()],
                    std::env::temp_dir(),
                    Duration::from_secs(10),
                ))
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
    }

    #[tokio::test]
    async fn scrubbed_environment_only_carries_declared_vars() {
        std::env::set_var("CROSSCHECK_SECRET", "do-not-leak");
        let outcome = runner()
            .run(&spec("env", &[], Duration::from_secs(5)))
            .await
            .unwrap();
        let env_dump = String::from_utf8_lossy(&outcome.stdout);
        assert!(!env_dump.contains("CROSSCHECK_SECRET"));
        assert!(env_dump.contains("PATH="));
    }

    #[test]
    fn screens_metacharacters() {
        assert!(screen_argument("rm -rf; echo").is_err());
        assert!(screen_argument("$(whoami)").is_err());
        assert!(screen_argument("`id`").is_err());
        assert!(screen_argument("--format=json").is_ok());
        assert!(screen_argument("./src/main.go").is_ok());
        assert!(screen_argument("/tmp/scan-dir/file.c").is_ok());
    }

    #[test]
    fn path_arguments_still_reject_dangerous_set() {
        assert!(screen_argument("/tmp/x;rm").is_err());
        assert!(screen_argument("./a|b").is_err());
    }
}
