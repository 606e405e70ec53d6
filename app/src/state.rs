//! Application state shared across commands

use std::sync::Arc;
use std::time::Duration;

use registry_client::{Registry, RegistryClient, SessionHandle, WalletSession};
use timelock::{
    Clock, CountdownHandle, CountdownTicker, LockCoordinator, LockStore, LockView, SystemClock,
};
use tokenlock_core::{Address, AppConfig, Error, RpcConfig};
use tokio::sync::{watch, Mutex, RwLock};

/// Registry-backed services built from the current config
#[derive(Clone)]
pub struct LockRuntime {
    pub registry: Arc<dyn Registry>,
    pub store: Arc<LockStore>,
    pub coordinator: Arc<LockCoordinator>,
    /// Concrete JSON-RPC client; absent when the registry was injected
    client: Option<RegistryClient>,
}

impl LockRuntime {
    fn new(registry: Arc<dyn Registry>, client: Option<RegistryClient>) -> Self {
        let store = Arc::new(LockStore::new(registry.clone()));
        let coordinator = Arc::new(LockCoordinator::new(registry.clone(), store.clone()));
        Self {
            registry,
            store,
            coordinator,
            client,
        }
    }

    pub fn client(&self) -> Option<&RegistryClient> {
        self.client.as_ref()
    }
}

struct Countdown {
    handle: CountdownHandle,
    views: watch::Receiver<Vec<LockView>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RwLock<AppConfig>,
    session: SessionHandle,
    clock: Arc<dyn Clock>,
    /// Fixed registry used instead of building a JSON-RPC client
    injected: Option<Arc<dyn Registry>>,
    runtime: RwLock<Option<LockRuntime>>,
    countdown: Mutex<Option<Countdown>>,
}

impl AppState {
    /// Create a new application state with default config
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create with a specific config
    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, None, Arc::new(SystemClock))
    }

    /// Create around an existing registry implementation and clock
    pub fn with_registry(
        config: AppConfig,
        registry: Arc<dyn Registry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(config, Some(registry), clock)
    }

    fn build(
        config: AppConfig,
        injected: Option<Arc<dyn Registry>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: RwLock::new(config),
                session: SessionHandle::new(),
                clock,
                injected,
                runtime: RwLock::new(None),
                countdown: Mutex::new(None),
            }),
        }
    }

    /// Get current config
    pub async fn config(&self) -> AppConfig {
        self.inner.config.read().await.clone()
    }

    /// Replace the RPC settings. The cached runtime and any running countdown
    /// are dropped and rebuilt on next use.
    pub async fn set_rpc_config(&self, rpc: RpcConfig) -> Result<(), Error> {
        Address::parse(&rpc.registry_address)?;

        {
            let mut config = self.inner.config.write().await;
            config.rpc = rpc;
        }
        self.reset_runtime().await;

        tracing::info!("Registry endpoint reconfigured");
        Ok(())
    }

    /// Drop the cached runtime and stop the countdown. The next use builds a
    /// runtime with an empty store.
    async fn reset_runtime(&self) {
        {
            let mut runtime = self.inner.runtime.write().await;
            *runtime = None;
        }
        self.stop_countdown().await;
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Registry services, built on first use
    pub async fn runtime(&self) -> Result<LockRuntime, Error> {
        if let Some(runtime) = self.inner.runtime.read().await.as_ref() {
            return Ok(runtime.clone());
        }

        let mut slot = self.inner.runtime.write().await;
        if let Some(runtime) = slot.as_ref() {
            return Ok(runtime.clone());
        }

        let runtime = match &self.inner.injected {
            Some(registry) => LockRuntime::new(registry.clone(), None),
            None => {
                let config = self.inner.config.read().await.clone();
                let client = RegistryClient::new(&config, self.inner.session.clone())?;
                tracing::debug!(
                    url = %config.rpc.url,
                    registry = %config.rpc.registry_address,
                    "Registry client created"
                );
                LockRuntime::new(Arc::new(client.clone()), Some(client))
            }
        };
        *slot = Some(runtime.clone());
        Ok(runtime)
    }

    // =========================================================================
    // Wallet session
    // =========================================================================

    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    pub async fn wallet(&self) -> Option<WalletSession> {
        self.inner.session.current().await
    }

    // Every session change resets the runtime so no view keeps showing the
    // previous owner's locks.

    /// Connect a wallet by address
    pub async fn connect_wallet(&self, address: &str) -> Result<Address, Error> {
        let address = Address::parse(address)?;
        self.inner.session.connect(address.clone()).await;
        self.reset_runtime().await;
        Ok(address)
    }

    /// Ask the endpoint's wallet for an account and connect it
    pub async fn request_accounts(&self) -> Result<Address, Error> {
        let runtime = self.runtime().await?;
        let client = runtime.client().ok_or_else(|| {
            Error::Config("wallet requests need a JSON-RPC registry endpoint".to_string())
        })?;

        let address = client.request_accounts().await?;
        self.reset_runtime().await;
        Ok(address)
    }

    pub async fn disconnect_wallet(&self) {
        self.inner.session.disconnect().await;
        self.reset_runtime().await;
    }

    // =========================================================================
    // Countdown
    // =========================================================================

    /// Subscribe to the countdown, starting the ticker if it is not running
    pub async fn start_countdown(&self) -> Result<watch::Receiver<Vec<LockView>>, Error> {
        let mut countdown = self.inner.countdown.lock().await;
        if let Some(running) = countdown.as_ref() {
            if !running.handle.is_finished() {
                return Ok(running.views.clone());
            }
        }

        let runtime = self.runtime().await?;
        let tick_ms = self.inner.config.read().await.countdown_tick_ms;
        let period = if tick_ms == 0 {
            timelock::constants::DEFAULT_TICK
        } else {
            Duration::from_millis(tick_ms)
        };

        let (handle, views) = CountdownTicker::spawn(runtime.store.clone(), self.clock(), period);
        *countdown = Some(Countdown {
            handle,
            views: views.clone(),
        });
        tracing::debug!(period_ms = period.as_millis() as u64, "Countdown started");
        Ok(views)
    }

    /// Stop the countdown; called when the lock view is torn down
    pub async fn stop_countdown(&self) {
        let running = self.inner.countdown.lock().await.take();
        if let Some(running) = running {
            running.handle.cancel().await;
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
