//! The assembled caching worker a host drives.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::cache::{BackingStore, CacheStoreManager, SqliteStorage, StoreNames};
use crate::clients::{BroadcastClients, ClientMessage};
use crate::config::Config;
use crate::control::{ControlChannel, ControlCommand, ControlMessage, ControlReply};
use crate::dispatch::{Dispatcher, Intercept};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::http::Request;
use crate::lifecycle::{ActivationReport, LifecycleCoordinator, Phase, SeedReport};

/// Wires configuration, storage, network and clients into the dispatcher,
/// lifecycle coordinator and control channel.
pub struct Worker {
  config: Arc<Config>,
  stores: Arc<CacheStoreManager>,
  dispatcher: Dispatcher,
  lifecycle: Arc<LifecycleCoordinator>,
  control: Arc<ControlChannel>,
  clients: Arc<BroadcastClients>,
}

impl Worker {
  pub fn new(config: Config, backend: Arc<dyn BackingStore>, fetcher: Arc<dyn Fetcher>) -> Self {
    let config = Arc::new(config);
    let stores = Arc::new(CacheStoreManager::new(
      backend,
      StoreNames::from_config(&config),
    ));
    let clients = Arc::new(BroadcastClients::default());

    let dispatcher = Dispatcher::new(config.clone(), stores.clone(), fetcher.clone());
    let lifecycle = Arc::new(LifecycleCoordinator::new(
      config.clone(),
      stores.clone(),
      fetcher,
      clients.clone(),
    ));
    let control = Arc::new(ControlChannel::new(
      config.clone(),
      stores.clone(),
      lifecycle.clone(),
    ));

    Self {
      config,
      stores,
      dispatcher,
      lifecycle,
      control,
      clients,
    }
  }

  /// Worker backed by the on-disk SQLite store and the real network.
  pub fn open(config: Config) -> Result<Self> {
    let storage = SqliteStorage::open(config.storage_path.as_deref())?;
    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    Ok(Self::new(config, Arc::new(storage), Arc::new(fetcher)))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn stores(&self) -> &CacheStoreManager {
    &self.stores
  }

  pub fn phase(&self) -> Phase {
    self.lifecycle.phase()
  }

  pub async fn install(&self) -> Result<SeedReport> {
    self.lifecycle.install().await
  }

  pub async fn activate(&self) -> Option<ActivationReport> {
    self.lifecycle.activate().await
  }

  /// The host found a newer generation.
  pub async fn update_found(&self) -> usize {
    self.lifecycle.announce_update().await
  }

  pub async fn handle_request(&self, request: &Request) -> Intercept {
    self.dispatcher.handle(request).await
  }

  /// Register a connected client.
  pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
    self.clients.subscribe()
  }

  /// Start serving control messages; the returned sender is the inbox.
  pub fn control_inbox(&self) -> mpsc::UnboundedSender<ControlMessage> {
    Arc::clone(&self.control).spawn()
  }

  /// Run one control command and wait for its reply.
  pub async fn send_control(&self, command: ControlCommand) -> Result<ControlReply> {
    let (message, rx) = ControlMessage::with_reply(command);
    self.control.handle(message).await;
    rx.await
      .map_err(|e| eyre!("Control reply channel closed: {}", e))
  }
}
