//! Reactor tasks: event reader, router loop, command writer.
//!
//! The router lives on a single task and handles one event to completion
//! before the next. The reader and writer only move lines in and out.

use crate::{component_debug, component_error, component_info, component_warn};
use anyhow::Result;
use fabric_routing::{Fdb, PathResolver, Router};
use fabric_wire::{encode_command, ControllerCommand, ControllerEvent, EventDecoder, MessageSender, WireError};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Capacity of the event channel between the reader and the router
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Fire-and-forget sender backed by an unbounded channel to the writer task
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<ControllerCommand>,
}

impl ChannelSender {
    /// Wrap the sending half of the command channel
    pub fn new(tx: mpsc::UnboundedSender<ControllerCommand>) -> Self {
        Self { tx }
    }
}

impl MessageSender for ChannelSender {
    fn send(&mut self, command: ControllerCommand) -> Result<(), WireError> {
        self.tx.send(command).map_err(|_| WireError::ChannelClosed)
    }
}

/// Decode JSON-lines events and forward them to the router
///
/// Malformed lines are logged and skipped. Returns the number of events
/// forwarded once input ends or the router is gone.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<ControllerEvent>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut decoder = EventDecoder::new();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        let event = match decoder.decode_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                component_warn!("reader", "Skipping line {}: {}", decoder.line_no(), e);
                continue;
            }
        };

        if tx.send(event).await.is_err() {
            component_debug!("reader", "Router stopped, no longer reading events");
            break;
        }
        forwarded += 1;
    }

    component_info!("reader", "Event input finished after {} lines", decoder.line_no());
    Ok(forwarded)
}

/// Encode commands as JSON lines until every sender is dropped
///
/// Returns the number of commands written.
pub async fn write_commands<W>(
    mut rx: mpsc::UnboundedReceiver<ControllerCommand>,
    mut writer: W,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(command) = rx.recv().await {
        let mut line = match encode_command(&command) {
            Ok(line) => line,
            Err(e) => {
                component_warn!("writer", "Dropping {:?}: {}", command, e);
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = write_line(&mut writer, &line).await {
            component_error!("writer", "Command output failed after {} commands: {}", written, e);
            return Err(e.into());
        }
        written += 1;
    }

    Ok(written)
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Drive the router until events run out or `shutdown` resolves
///
/// Host aging runs every `age_interval`. Send failures are logged and the
/// loop carries on. The router is handed back so the caller can report on it.
pub async fn run_router<F, R, S, Sd>(
    mut router: Router<F, R, S>,
    mut events: mpsc::Receiver<ControllerEvent>,
    age_interval: Duration,
    shutdown: Sd,
) -> Router<F, R, S>
where
    F: Fdb,
    R: PathResolver,
    S: MessageSender,
    Sd: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut aging = tokio::time::interval(age_interval);
    aging.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    aging.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    component_info!("reactor", "Event stream closed");
                    break;
                };

                let kind = event.kind();
                if let Err(e) = router.handle_event(event) {
                    component_warn!("reactor", "Failed to handle {} event: {}", kind, e);
                }
            }

            _ = aging.tick() => {
                let removed = router.age_out_hosts();
                if removed > 0 {
                    component_debug!("reactor", "Aged out {} hosts", removed);
                }
            }

            _ = &mut shutdown => {
                component_info!("reactor", "Shutdown requested");
                break;
            }
        }
    }

    router
}
