//! Kernel subprocess handles.
//!
//! A kernel is this same binary relaunched with the internal `--kernel`
//! flag (plus `--resume <path>` for fork heirs). Each process gets a
//! dedicated writer task feeding framed requests into its stdin and a
//! reader task pushing decoded response frames into the run-manager
//! mailbox. Pipes are owned by exactly one reader and one writer.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use uuid::Uuid;

use twinsong_core::ipc::protocol::{KernelRequest, KernelResponse};
use twinsong_core::ipc::{read_frame_async, write_frame_async};

use crate::error::{ServerError, ServerResult};

/// A decoded event from a kernel process, delivered to the run manager.
#[derive(Debug)]
pub enum KernelEvent {
    /// A response frame arrived.
    Response {
        run_id: Uuid,
        response: KernelResponse,
    },
    /// The process exited or its pipe broke.
    Exited { run_id: Uuid },
}

/// Grace period between SIGTERM and SIGKILL on close.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Handle to one kernel subprocess.
pub struct KernelProcess {
    pid: u32,
    child: Option<Child>,
    tx: mpsc::UnboundedSender<KernelRequest>,
}

impl KernelProcess {
    /// Spawn a kernel for `run_id`, optionally resuming from a fork
    /// handoff blob. Response frames flow into `events`.
    pub fn spawn(
        run_id: Uuid,
        resume: Option<PathBuf>,
        events: mpsc::UnboundedSender<KernelEvent>,
    ) -> ServerResult<KernelProcess> {
        let exe = std::env::current_exe()
            .map_err(|e| ServerError::KernelSpawn(format!("cannot locate own binary: {}", e)))?;

        let mut command = Command::new(exe);
        command.arg("--kernel");
        if let Some(path) = &resume {
            command.arg("--resume").arg(path);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Kernel logs go to stderr; let them pass through.
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ServerError::KernelSpawn(e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| ServerError::KernelSpawn("kernel exited during spawn".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServerError::KernelSpawn("no kernel stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServerError::KernelSpawn("no kernel stdout".to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<KernelRequest>();

        // Writer task: owns the stdin pipe.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(request) = rx.recv().await {
                if let Err(e) = write_frame_async(&mut stdin, &request).await {
                    tracing::warn!("kernel {} write failed: {}", run_id, e);
                    break;
                }
            }
            // Dropping stdin closes the kernel's request stream.
        });

        // Reader task: owns the stdout pipe.
        tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            loop {
                match read_frame_async::<_, KernelResponse>(&mut stdout).await {
                    Ok(response) => {
                        if events
                            .send(KernelEvent::Response { run_id, response })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("kernel {} response stream ended: {}", run_id, e);
                        let _ = events.send(KernelEvent::Exited { run_id });
                        break;
                    }
                }
            }
        });

        Ok(KernelProcess {
            pid,
            child: Some(child),
            tx,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Queue a request for the writer task.
    pub fn send(&self, request: KernelRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!("kernel {} writer is gone, request dropped", self.pid);
        }
    }

    /// Terminate the process: SIGTERM first, SIGKILL after the grace
    /// period. Runs on a detached task so the caller never blocks on the
    /// subprocess.
    pub fn close(mut self) {
        let pid = self.pid;
        let child = self.child.take();
        tokio::spawn(async move {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
            if let Some(mut child) = child {
                match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
                    Ok(status) => {
                        tracing::debug!("kernel {} exited: {:?}", pid, status);
                    }
                    Err(_) => {
                        tracing::warn!("kernel {} ignored SIGTERM, killing", pid);
                        let _ = child.kill().await;
                    }
                }
            }
        });
    }
}
