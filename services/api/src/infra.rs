use metrics_exporter_prometheus::PrometheusHandle;
use partner_hub::config::AppConfig;
use partner_hub::error::AppError;
use partner_hub::marketplace::{
    Database, LogTransport, Marketplace, MarketplaceSettings, NotificationDispatcher,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ApiMarketplace = Marketplace<Database, NotificationDispatcher>;

/// Storage handle, services, and the notification worker for one process lifetime.
pub(crate) struct MarketplaceRuntime {
    pub(crate) marketplace: Arc<ApiMarketplace>,
    store: Arc<Database>,
    notifications: JoinHandle<()>,
}

impl MarketplaceRuntime {
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(config: &AppConfig) -> Result<Self, AppError> {
        let store = Arc::new(Database::open(&config.storage)?);
        let (dispatcher, notifications) = NotificationDispatcher::spawn(
            Arc::new(LogTransport),
            config.notifications.queue_capacity,
        );
        let marketplace = Arc::new(Marketplace::new(
            store.clone(),
            Arc::new(dispatcher),
            MarketplaceSettings::from_config(config),
        ));

        Ok(Self {
            marketplace,
            store,
            notifications,
        })
    }

    /// Snapshot file backing the store, if any.
    pub(crate) fn data_path(&self) -> Option<&Path> {
        self.store.data_path()
    }

    /// Drain queued notifications and flush the snapshot. Callers must drop every other clone of
    /// the marketplace first, otherwise both steps are skipped.
    pub(crate) async fn shutdown(self) -> Result<(), AppError> {
        let MarketplaceRuntime {
            marketplace,
            store,
            notifications,
        } = self;

        if Arc::try_unwrap(marketplace).is_err() {
            warn!("marketplace still shared at shutdown; skipping drain and flush");
            return Ok(());
        }
        if let Err(err) = notifications.await {
            warn!(error = %err, "notification worker stopped abnormally");
        }

        match Arc::try_unwrap(store) {
            Ok(store) => store.close()?,
            Err(_) => warn!("storage still shared at shutdown; skipping final flush"),
        }
        info!("marketplace shut down");
        Ok(())
    }
}
