//! Out-of-band commands from the client application.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::cache::CacheStoreManager;
use crate::config::Config;
use crate::lifecycle::LifecycleCoordinator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlCommand {
  /// Promote the waiting generation now
  #[serde(alias = "SKIP_WAITING")]
  ForceActivate,
  /// Delete every store
  #[serde(alias = "CLEAR_CACHE")]
  Invalidate,
  /// Re-seed the current core store
  #[serde(alias = "UPDATE_CACHE")]
  Refresh,
  #[serde(alias = "GET_VERSION")]
  ReportVersion,
}

impl FromStr for ControlCommand {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
      .map_err(|_| eyre!("Unknown control command: {}", s))
  }
}

/// Reply posted on a message's reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
  Ack {
    success: bool,
  },
  Version {
    version: String,
    #[serde(rename = "storeName")]
    store_name: String,
  },
}

/// A command plus the channel its single reply goes to, if the sender wants one.
#[derive(Debug)]
pub struct ControlMessage {
  pub command: ControlCommand,
  pub reply: Option<oneshot::Sender<ControlReply>>,
}

#[derive(Deserialize)]
struct Envelope {
  kind: ControlCommand,
}

impl ControlMessage {
  pub fn new(command: ControlCommand) -> Self {
    Self {
      command,
      reply: None,
    }
  }

  /// Build a message and the receiver its reply will arrive on.
  pub fn with_reply(command: ControlCommand) -> (Self, oneshot::Receiver<ControlReply>) {
    let (tx, rx) = oneshot::channel();
    (
      Self {
        command,
        reply: Some(tx),
      },
      rx,
    )
  }

  /// Parse a `{"kind": ...}` message.
  pub fn from_json(json: &str, reply: Option<oneshot::Sender<ControlReply>>) -> Result<Self> {
    let envelope: Envelope =
      serde_json::from_str(json).map_err(|e| eyre!("Invalid control message: {}", e))?;
    Ok(Self {
      command: envelope.kind,
      reply,
    })
  }
}

/// Stateless command dispatch.
pub struct ControlChannel {
  config: Arc<Config>,
  stores: Arc<CacheStoreManager>,
  lifecycle: Arc<LifecycleCoordinator>,
}

impl ControlChannel {
  pub fn new(
    config: Arc<Config>,
    stores: Arc<CacheStoreManager>,
    lifecycle: Arc<LifecycleCoordinator>,
  ) -> Self {
    Self {
      config,
      stores,
      lifecycle,
    }
  }

  /// Run a command and post exactly one reply if a channel was provided.
  pub async fn handle(&self, message: ControlMessage) {
    let reply = self.execute(message.command).await;

    if let Some(tx) = message.reply {
      if tx.send(reply).is_err() {
        debug!(command = ?message.command, "Reply receiver dropped");
      }
    }
  }

  pub async fn execute(&self, command: ControlCommand) -> ControlReply {
    info!(?command, "Control command received");

    match command {
      ControlCommand::ForceActivate => {
        self.lifecycle.skip_waiting().await;
        ControlReply::Ack { success: true }
      }
      ControlCommand::Invalidate => match self.stores.delete_all().await {
        Ok(_) => ControlReply::Ack { success: true },
        Err(e) => {
          error!("Failed to clear stores: {}", e);
          ControlReply::Ack { success: false }
        }
      },
      ControlCommand::Refresh => match self.lifecycle.refresh().await {
        Ok(_) => ControlReply::Ack { success: true },
        Err(e) => {
          error!("Failed to refresh core store: {}", e);
          ControlReply::Ack { success: false }
        }
      },
      ControlCommand::ReportVersion => ControlReply::Version {
        version: self.config.version.clone(),
        store_name: self.stores.names().core.clone(),
      },
    }
  }

  /// Serve messages from an inbox until every sender is dropped.
  ///
  /// Each message runs on its own task so a slow refresh does not hold up
  /// a version query.
  pub fn spawn(self: Arc<Self>) -> mpsc::UnboundedSender<ControlMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ControlMessage>();

    tokio::spawn(async move {
      while let Some(message) = rx.recv().await {
        let channel = Arc::clone(&self);
        tokio::spawn(async move {
          channel.handle(message).await;
        });
      }
    });

    tx
  }
}
