//! Install-time seeding and activate-time promotion of a cache generation.

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStoreManager, StoreHandle, StoreRole};
use crate::clients::{ClientMessage, Clients, NotificationKind};
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::http::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Constructed, nothing run yet
  Parsed,
  Installing,
  /// Seeded and waiting to be promoted
  Installed,
  Activating,
  Activated,
}

/// Per-asset outcome of a seed or refresh pass.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
  pub stored: Vec<String>,
  /// Asset and the reason it was skipped
  pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
  pub evicted: Vec<String>,
  pub claimed: usize,
  pub notified: usize,
  /// Steps that failed; they are logged and not retried
  pub errors: Vec<String>,
}

struct State {
  phase: Phase,
  skip_waiting: bool,
}

pub struct LifecycleCoordinator {
  config: Arc<Config>,
  stores: Arc<CacheStoreManager>,
  fetcher: Arc<dyn Fetcher>,
  clients: Arc<dyn Clients>,
  state: Mutex<State>,
}

impl LifecycleCoordinator {
  pub fn new(
    config: Arc<Config>,
    stores: Arc<CacheStoreManager>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn Clients>,
  ) -> Self {
    let skip_waiting = config.skip_waiting;
    Self {
      config,
      stores,
      fetcher,
      clients,
      state: Mutex::new(State {
        phase: Phase::Parsed,
        skip_waiting,
      }),
    }
  }

  pub fn phase(&self) -> Phase {
    self.state().phase
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Seed the core store, then promote immediately if skip-waiting is set.
  ///
  /// Fails only when the core store cannot be opened; individual asset
  /// failures are reported, not raised.
  pub async fn install(&self) -> Result<SeedReport> {
    self.state().phase = Phase::Installing;
    info!(version = %self.config.version, "Installing new version");

    let report = self.seed().await;
    match &report {
      Ok(report) => info!(
        stored = report.stored.len(),
        failed = report.failed.len(),
        "Seeded core assets"
      ),
      Err(e) => error!("Install could not seed core store: {}", e),
    }

    let skip_waiting = {
      let mut state = self.state();
      state.phase = Phase::Installed;
      state.skip_waiting
    };

    if skip_waiting {
      self.activate().await;
    }

    report
  }

  /// Fetch every core asset into the core store.
  pub async fn seed(&self) -> Result<SeedReport> {
    self.populate(false).await
  }

  /// Re-fetch every core asset, bypassing intermediary caches, and overwrite
  /// the current core store.
  pub async fn refresh(&self) -> Result<SeedReport> {
    let report = self.populate(true).await?;
    info!(
      refreshed = report.stored.len(),
      failed = report.failed.len(),
      "Refreshed core assets"
    );
    Ok(report)
  }

  async fn populate(&self, no_cache: bool) -> Result<SeedReport> {
    let store = self
      .stores
      .open(StoreRole::Core)
      .await
      .ok_or_else(|| eyre!("Core store {} unavailable", self.stores.names().core))?;

    let mut report = SeedReport::default();
    for asset in &self.config.core_assets {
      match self.fetch_into(&store, asset, no_cache).await {
        Ok(()) => {
          debug!(url = %asset, "Stored core asset");
          report.stored.push(asset.clone());
        }
        Err(e) => {
          warn!(url = %asset, "Failed to store core asset: {}", e);
          report.failed.push((asset.clone(), e.to_string()));
        }
      }
    }

    Ok(report)
  }

  async fn fetch_into(&self, store: &StoreHandle, asset: &str, no_cache: bool) -> Result<()> {
    let mut request = Request::get(self.config.resolve(asset)?);
    if no_cache {
      request = request.no_cache();
    }

    let response = self.fetcher.fetch(&request).await?;
    if !response.is_ok() {
      return Err(eyre!("Unexpected status {}", response.status));
    }
    if !store.put(&request, &response).await {
      return Err(eyre!("Write to {} failed", store.name()));
    }

    Ok(())
  }

  /// Promote the installed generation without waiting for old clients.
  ///
  /// Before install has finished this only records the request; install
  /// then promotes on completion.
  pub async fn skip_waiting(&self) -> Option<ActivationReport> {
    let promote_now = {
      let mut state = self.state();
      state.skip_waiting = true;
      state.phase == Phase::Installed
    };

    if promote_now {
      self.activate().await
    } else {
      debug!("Skip-waiting recorded, activation follows install");
      None
    }
  }

  /// Evict stale stores, claim clients, then tell them about the update.
  ///
  /// Returns `None` if activation already ran or is running. A failing step
  /// is logged and recorded; the remaining steps still run.
  pub async fn activate(&self) -> Option<ActivationReport> {
    {
      let mut state = self.state();
      if matches!(state.phase, Phase::Activating | Phase::Activated) {
        debug!(phase = ?state.phase, "Activation already handled");
        return None;
      }
      state.phase = Phase::Activating;
    }
    info!(version = %self.config.version, "Activating new version");

    let mut report = ActivationReport::default();

    match self.stores.evict_stale().await {
      Ok(evicted) => {
        info!(count = evicted.len(), "Removed stale stores");
        report.evicted = evicted;
      }
      Err(e) => {
        error!("Failed to evict stale stores: {}", e);
        report.errors.push(format!("evict: {}", e));
      }
    }

    match self.clients.claim().await {
      Ok(claimed) => {
        info!(clients = claimed, "Claimed clients");
        report.claimed = claimed;
      }
      Err(e) => {
        error!("Failed to claim clients: {}", e);
        report.errors.push(format!("claim: {}", e));
      }
    }

    let message = ClientMessage {
      kind: NotificationKind::Updated,
      text: format!(
        "{} updated to version {}",
        self.config.name, self.config.version
      ),
    };
    match self.clients.notify_all(message).await {
      Ok(notified) => report.notified = notified,
      Err(e) => {
        error!("Failed to notify clients: {}", e);
        report.errors.push(format!("notify: {}", e));
      }
    }

    self.state().phase = Phase::Activated;
    Some(report)
  }

  /// Tell connected clients that a new version was found.
  pub async fn announce_update(&self) -> usize {
    info!(version = %self.config.version, "Update available");
    let message = ClientMessage {
      kind: NotificationKind::UpdateAvailable,
      text: format!(
        "A new version of {} is available: {}",
        self.config.name, self.config.version
      ),
    };

    self.clients.notify_all(message).await.unwrap_or_else(|e| {
      warn!("Failed to announce update: {}", e);
      0
    })
  }
}
