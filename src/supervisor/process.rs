//! Spawning, signalling and observing the relay process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::watch;

use crate::supervisor::state::ExitInfo;

/// Everything needed to launch the relay.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub config_flag: String,
    pub config_path: PathBuf,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// `<binary> <args...> [<config_flag>] <config_path>`
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![self.binary.display().to_string()];
        line.extend(self.args.iter().cloned());
        if !self.config_flag.is_empty() {
            line.push(self.config_flag.clone());
        }
        line.push(self.config_path.display().to_string());
        line
    }
}

/// A spawned relay. The child itself is owned by its waiter task; the
/// supervisor keeps the pid and an exit notification.
#[derive(Debug)]
pub struct SpawnedRelay {
    pub pid: u32,
    pub exit: watch::Receiver<Option<ExitInfo>>,
}

/// Spawn the relay and a task that reaps it.
///
/// `on_exit` runs in the waiter task after the exit status is published.
pub fn spawn_relay<F>(spec: &LaunchSpec, on_exit: F) -> std::io::Result<SpawnedRelay>
where
    F: FnOnce(ExitInfo) + Send + 'static,
{
    let mut cmd = Command::new(&spec.binary);
    cmd.args(&spec.args);
    if !spec.config_flag.is_empty() {
        cmd.arg(&spec.config_flag);
    }
    cmd.arg(&spec.config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| std::io::Error::other("relay exited before its pid could be read"))?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(stdout, pid, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(stderr, pid, "stderr"));
    }

    let (exit_tx, exit_rx) = watch::channel(None);
    tokio::spawn(async move {
        let exit = match child.wait().await {
            Ok(status) => ExitInfo::from(status),
            Err(e) => {
                tracing::error!(pid, error = %e, "Failed to wait on relay process");
                ExitInfo::default()
            }
        };
        let _ = exit_tx.send(Some(exit));
        on_exit(exit);
    });

    Ok(SpawnedRelay { pid, exit: exit_rx })
}

async fn forward_output<R>(stream: R, pid: u32, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "relay", pid, stream = name, "{}", line);
    }
}

/// Send `signal` to `pid`.
pub fn send_signal(pid: u32, signal: Signal) -> Result<(), Errno> {
    let raw = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    kill(Pid::from_raw(raw), signal)
}

/// Wait until the exit notification carries a value.
///
/// A dropped sender means the waiter task is gone, which only happens once
/// the process has been reaped.
pub async fn wait_exit(exit: &mut watch::Receiver<Option<ExitInfo>>) -> ExitInfo {
    if let Ok(value) = exit.wait_for(Option::is_some).await {
        return value.unwrap_or_default();
    }
    exit.borrow().unwrap_or_default()
}

pub fn has_exited(exit: &watch::Receiver<Option<ExitInfo>>) -> Option<ExitInfo> {
    *exit.borrow()
}

/// Outcome of the post-grace liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Ready,
    Exited(ExitInfo),
    TimedOut,
}

/// Try to connect to `addr` until it accepts, the process exits, or
/// `timeout` elapses.
pub async fn probe_tcp(
    addr: &str,
    timeout: Duration,
    exit: &mut watch::Receiver<Option<ExitInfo>>,
) -> ProbeResult {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(info) = has_exited(exit) {
            return ProbeResult::Exited(info);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeResult::TimedOut;
        }

        let attempt = remaining.min(Duration::from_millis(500));
        if let Ok(Ok(_)) = tokio::time::timeout(attempt, TcpStream::connect(addr)).await {
            return ProbeResult::Ready;
        }

        tokio::select! {
            info = wait_exit(exit) => return ProbeResult::Exited(info),
            _ = tokio::time::sleep(Duration::from_millis(100).min(remaining)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_launch(script: &str) -> LaunchSpec {
        LaunchSpec {
            binary: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            config_flag: "--config".into(),
            config_path: PathBuf::from("/tmp/relay.toml"),
            working_dir: None,
        }
    }

    #[test]
    fn test_command_line_layout() {
        let mut s = sh_launch("true");
        assert_eq!(
            s.command_line(),
            vec!["/bin/sh", "-c", "true", "--config", "/tmp/relay.toml"]
        );

        s.config_flag.clear();
        assert_eq!(s.command_line().last().map(String::as_str), Some("/tmp/relay.toml"));
    }

    #[tokio::test]
    async fn test_exit_code_is_observed() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut relay = spawn_relay(&sh_launch("exit 4"), move |exit| {
            let _ = tx.send(exit);
        })
        .unwrap();

        let exit = wait_exit(&mut relay.exit).await;
        assert_eq!(exit.code, Some(4));
        assert_eq!(rx.await.unwrap(), exit);
    }

    #[tokio::test]
    async fn test_signal_terminates() {
        let mut relay = spawn_relay(&sh_launch("exec sleep 30"), |_| {}).unwrap();
        send_signal(relay.pid, Signal::SIGTERM).unwrap();

        let exit = wait_exit(&mut relay.exit).await;
        assert_eq!(exit.signal, Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_probe_times_out_on_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut relay = spawn_relay(&sh_launch("exec sleep 30"), |_| {}).unwrap();
        let result = probe_tcp(&addr, Duration::from_millis(300), &mut relay.exit).await;
        assert_eq!(result, ProbeResult::TimedOut);
        send_signal(relay.pid, Signal::SIGKILL).unwrap();
    }

    #[tokio::test]
    async fn test_probe_succeeds_on_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut relay = spawn_relay(&sh_launch("exec sleep 30"), |_| {}).unwrap();
        let result = probe_tcp(&addr, Duration::from_secs(2), &mut relay.exit).await;
        assert_eq!(result, ProbeResult::Ready);
        send_signal(relay.pid, Signal::SIGKILL).unwrap();
    }
}
