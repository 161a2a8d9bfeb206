//! Client notification channel.

use async_trait::async_trait;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
  /// A new generation finished activating
  Updated,
  /// A new generation was found and is installing
  UpdateAvailable,
}

/// Structured message pushed to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
  pub kind: NotificationKind,
  pub text: String,
}

/// The connected client instances, as seen by the lifecycle coordinator.
#[async_trait]
pub trait Clients: Send + Sync {
  /// Take control of every connected client. Returns how many there are.
  async fn claim(&self) -> Result<usize>;

  /// Send a message to every connected client. Returns how many received it.
  async fn notify_all(&self, message: ClientMessage) -> Result<usize>;
}

/// In-process clients backed by a broadcast channel; each subscriber is a client.
pub struct BroadcastClients {
  tx: broadcast::Sender<ClientMessage>,
  claimed: AtomicBool,
}

impl BroadcastClients {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity);
    Self {
      tx,
      claimed: AtomicBool::new(false),
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
    self.tx.subscribe()
  }

  pub fn is_claimed(&self) -> bool {
    self.claimed.load(Ordering::SeqCst)
  }
}

impl Default for BroadcastClients {
  fn default() -> Self {
    Self::new(16)
  }
}

#[async_trait]
impl Clients for BroadcastClients {
  async fn claim(&self) -> Result<usize> {
    self.claimed.store(true, Ordering::SeqCst);
    Ok(self.tx.receiver_count())
  }

  async fn notify_all(&self, message: ClientMessage) -> Result<usize> {
    // Err only means there are no subscribers
    Ok(self.tx.send(message).unwrap_or(0))
  }
}
