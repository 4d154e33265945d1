//! Child process spawning with captured output and a hard timeout.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::executor::{ProcessInput, ProcessOutput, ScriptError};

/// Per-stream capture limit; bytes beyond it are not read.
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Spawn `cmd` with the input's arguments, capture stdout/stderr, and
/// enforce the timeout.
///
/// Stdin is closed. The timeout covers both the exit and the draining of the
/// pipes, so a background process that inherited them cannot stretch the run.
/// On Unix the child leads its own process group and the whole group is
/// killed on timeout; elsewhere only the child is (via `kill_on_drop`).
/// Partial output is discarded.
pub async fn run_command(
    cmd: &mut Command,
    input: ProcessInput,
) -> Result<ProcessOutput, ScriptError> {
    cmd.args(&input.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(ScriptError::IoError)?;
    let pid = child.id();

    // Drain both pipes while waiting so the child never blocks on a full pipe.
    let stdout = capture(child.stdout.take());
    let stderr = capture(child.stderr.take());
    let readers = [stdout.abort_handle(), stderr.abort_handle()];

    let run = async {
        let status = child.wait().await?;
        let (stdout, stderr) = tokio::join!(stdout, stderr);
        Ok::<_, std::io::Error>((status, stdout.unwrap_or_default(), stderr.unwrap_or_default()))
    };

    match tokio::time::timeout(input.timeout, run).await {
        Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
            stdout: lossy(stdout),
            stderr: lossy(stderr),
            exit_code: status.code().unwrap_or(-1),
            duration_ms: elapsed_ms(started),
        }),
        Ok(Err(e)) => {
            kill_process_group(pid);
            readers.iter().for_each(|reader| reader.abort());
            Err(ScriptError::IoError(e))
        }
        Err(_) => {
            kill_process_group(pid);
            drop(child);
            readers.iter().for_each(|reader| reader.abort());
            Err(ScriptError::Timeout {
                elapsed_ms: elapsed_ms(started),
            })
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // Safety: killpg only signals; the group was created for this child and
    // outlives it while any member still holds the pipes.
    let ret = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Read a pipe to its end (or the capture limit) on a separate task.
fn capture<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = pipe {
            let _ = pipe.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
        }
        buf
    })
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::scripting::test_helpers::{default_input, write_temp_script};

    fn bash(script: &tempfile::NamedTempFile, mut input: ProcessInput) -> ProcessInput {
        input
            .args
            .insert(0, script.path().to_str().expect("path").to_string());
        input
    }

    #[tokio::test]
    async fn captures_stdout_and_args() {
        let script = write_temp_script("echo \"args: $*\"\n");
        let mut input = default_input();
        input.args = vec!["--input=/a.jpg".into(), "--calibration=height".into()];
        let output = run_command(&mut Command::new("bash"), bash(&script, input))
            .await
            .expect("run");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "args: --input=/a.jpg --calibration=height");
    }

    #[tokio::test]
    async fn captures_stderr_and_nonzero_exit() {
        let script = write_temp_script("echo 'person not detected' >&2\nexit 3\n");
        let output = run_command(&mut Command::new("bash"), bash(&script, default_input()))
            .await
            .expect("run");
        assert_eq!(output.exit_code, 3);
        assert!(output.stderr.contains("person not detected"));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn stdout_is_capped() {
        let script = write_temp_script("head -c 12000000 /dev/zero | tr '\\0' 'x'\n");
        let output = run_command(&mut Command::new("bash"), bash(&script, default_input()))
            .await
            .expect("run");
        assert_eq!(output.stdout.len() as u64, MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let script = write_temp_script("sleep 30\necho done\n");
        let mut input = default_input();
        input.timeout = Duration::from_millis(200);
        let started = Instant::now();
        let result = run_command(&mut Command::new("bash"), bash(&script, input)).await;
        assert_matches!(result, Err(ScriptError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn timeout_covers_output_held_open_by_background_process() {
        let script = write_temp_script(
            "sleep 5 &\necho '{\"success\": true}'\nexit 0\n",
        );
        let mut input = default_input();
        input.timeout = Duration::from_millis(500);
        let started = Instant::now();
        let result = run_command(&mut Command::new("bash"), bash(&script, input)).await;
        assert_matches!(result, Err(ScriptError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_background_processes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("survived");
        let script = write_temp_script("(sleep 1; touch \"$1\") &\necho started\n");
        let mut input = default_input();
        input.args = vec![marker.to_str().expect("utf-8 path").to_string()];
        input.timeout = Duration::from_millis(300);
        let result = run_command(&mut Command::new("bash"), bash(&script, input)).await;
        assert_matches!(result, Err(ScriptError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "background process outlived the timeout");
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let result = run_command(
            &mut Command::new("/nonexistent/measurement-binary"),
            default_input(),
        )
        .await;
        assert_matches!(result, Err(ScriptError::IoError(_)));
    }
}
