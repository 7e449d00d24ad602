//! Inbound JSON-lines protocol from the host shell.
//!
//! ```text
//! {"type":"uiEvent","package":"com.google.android.youtube","snapshot":{"nodes":[...]}}
//! {"type":"bypass","credential":"1234"}
//! {"type":"acknowledge"}
//! {"type":"stopEarly"}
//! {"type":"rearm"}
//! {"type":"status"}
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    emitter::{EventEmitter, MonitorEvent},
    sensing::HostEvent,
    timer::MonitorController,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    UiEvent(HostEvent),
    Bypass { credential: String },
    Acknowledge,
    StopEarly,
    Rearm,
    Status,
}

impl HostMessage {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| "failed to parse host message")
    }
}

/// Applies one host message and reports the result on `emitter`.
pub async fn dispatch<W: Write + Send>(
    controller: &MonitorController,
    emitter: &EventEmitter<W>,
    message: HostMessage,
) -> Result<()> {
    let reply = match message {
        HostMessage::UiEvent(event) => controller
            .handle_event(&event)
            .await
            .map(|edge| MonitorEvent::ModeChanged { edge }),
        HostMessage::Bypass { credential } => Some(MonitorEvent::Bypass {
            outcome: controller.submit_bypass(&credential).await,
        }),
        HostMessage::Acknowledge => {
            controller.acknowledge().await;
            None
        }
        HostMessage::StopEarly => {
            controller.stop_early().await;
            None
        }
        HostMessage::Rearm => {
            controller.rearm().await;
            None
        }
        HostMessage::Status => Some(MonitorEvent::Snapshot {
            snapshot: controller.snapshot().await,
        }),
    };

    if let Some(event) = reply {
        emitter.emit(&event)?;
    }
    Ok(())
}

/// Reads host messages until EOF. Malformed lines are reported back and
/// skipped.
pub async fn serve<R, W>(
    controller: &MonitorController,
    emitter: &EventEmitter<W>,
    reader: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read from host")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match HostMessage::parse(line) {
            Ok(message) => {
                log_debug!("Host message: {message:?}");
                dispatch(controller, emitter, message).await?;
            }
            Err(err) => {
                log_warn!("{err:#}");
                emitter.emit(&MonitorEvent::Error {
                    message: format!("{err:#}"),
                })?;
            }
        }
    }
    Ok(())
}
