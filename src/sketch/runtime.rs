use crate::sketch::controller::ControlLoop;
use anyhow::{anyhow, Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const CONTROL_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ControlLoopHandle {
    thread: JoinHandle<()>,
    done_rx: Receiver<Result<()>>,
}

pub fn spawn_control_loop(control: ControlLoop) -> Result<ControlLoopHandle> {
    let (done_tx, done_rx) = channel();
    let thread = thread::Builder::new()
        .name("sketch-control".to_string())
        .spawn(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(move || control.run())) {
                Ok(result) => result,
                Err(payload) => {
                    let panic_message = if let Some(message) = payload.downcast_ref::<&str>() {
                        (*message).to_string()
                    } else if let Some(message) = payload.downcast_ref::<String>() {
                        message.clone()
                    } else {
                        "unknown panic payload".to_string()
                    };
                    tracing::error!(panic_message, "control loop thread panicked");
                    Err(anyhow!("control loop panicked: {panic_message}"))
                }
            };
            let _ = done_tx.send(result);
        })
        .context("spawn control loop thread")?;
    Ok(ControlLoopHandle { thread, done_rx })
}

impl ControlLoopHandle {
    /// Waits up to `timeout` for the loop to finish and returns its result.
    /// A loop stuck inside a classifier call is abandoned, not killed.
    pub fn join_with_timeout(self, timeout: Duration) -> Result<()> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(result) => {
                if self.thread.join().is_err() {
                    tracing::error!("control loop thread panicked while joining");
                }
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(?timeout, "control loop join timed out");
                Err(anyhow!("control loop did not stop within {timeout:?}"))
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("control loop result channel disconnected");
                Err(anyhow!("control loop exited without reporting a result"))
            }
        }
    }
}
