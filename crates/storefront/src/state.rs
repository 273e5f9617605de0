//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::db::{
    CatalogStore, ProjectRepository, PurchaseRepository, PurchaseStore, UserRecordRepository,
};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::Principal;
use crate::services::{
    ArtifactSigner, DownloadSigner, PaymentError, PaymentProcessor, RazorpayClient,
};
use crate::store::{Collections, MirrorHandle, MirrorUpdate};
use crate::sync::{self, RemoteMirrorStore, run_mirror_worker};

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to open local cache: {0}")]
    Cache(#[from] std::io::Error),
    #[error("failed to build payment client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    collections: Mutex<Collections>,
    mirror: MirrorHandle,
    mirror_rx: std::sync::Mutex<Option<UnboundedReceiver<MirrorUpdate>>>,
    principal: RwLock<Option<Principal>>,
    checkouts: Mutex<HashMap<Uuid, Checkout>>,
    catalog: Arc<dyn CatalogStore>,
    purchases: Arc<dyn PurchaseStore>,
    remote: Arc<dyn RemoteMirrorStore>,
    payments: Arc<dyn PaymentProcessor>,
    signer: DownloadSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Opens the durable local cache, hydrates the collections from it, and
    /// wires the repositories and service clients. The mirror worker is not
    /// started here; call [`AppState::start_mirror_sync`] once after
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or the
    /// payment client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let cache = LocalCache::open(&config.cache_dir)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mirror = MirrorHandle::new(tx);
        let collections = Mutex::new(Collections::open(cache, mirror.clone()));

        let catalog = Arc::new(ProjectRepository::new(pool.clone()));
        let purchases = Arc::new(PurchaseRepository::new(pool.clone()));
        let remote = Arc::new(UserRecordRepository::new(pool.clone()));
        let payments = Arc::new(RazorpayClient::new(&config.payments)?);
        let signer = DownloadSigner::new(
            config.base_url.clone(),
            config.download_signing_secret.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                collections,
                mirror,
                mirror_rx: std::sync::Mutex::new(Some(rx)),
                principal: RwLock::new(None),
                checkouts: Mutex::new(HashMap::new()),
                catalog,
                purchases,
                remote,
                payments,
                signer,
            }),
        })
    }

    /// Spawn the mirror sync worker.
    ///
    /// Idempotent: the receiver is taken on the first call, later calls are
    /// no-ops.
    pub fn start_mirror_sync(&self) {
        let rx = self
            .inner
            .mirror_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(rx) = rx {
            let remote = Arc::clone(&self.inner.remote);
            tokio::spawn(run_mirror_worker(remote, rx));
            tracing::info!("mirror sync worker started");
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The cart and wishlist collections.
    #[must_use]
    pub fn collections(&self) -> &Mutex<Collections> {
        &self.inner.collections
    }

    /// In-flight checkouts by id. Terminal checkouts stay in the map so a
    /// repeated settlement call is answered instead of dropped.
    #[must_use]
    pub fn checkouts(&self) -> &Mutex<HashMap<Uuid, Checkout>> {
        &self.inner.checkouts
    }

    /// Get a reference to the catalog store.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.catalog.as_ref()
    }

    /// Get a reference to the purchase store.
    #[must_use]
    pub fn purchases(&self) -> &dyn PurchaseStore {
        self.inner.purchases.as_ref()
    }

    /// Get a reference to the remote mirror store.
    #[must_use]
    pub fn remote(&self) -> &dyn RemoteMirrorStore {
        self.inner.remote.as_ref()
    }

    /// Get a reference to the payment processor.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProcessor {
        self.inner.payments.as_ref()
    }

    /// Get a reference to the download URL signer.
    #[must_use]
    pub fn signer(&self) -> &dyn ArtifactSigner {
        &self.inner.signer
    }

    /// The signed-in principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.inner
            .principal
            .read()
            .ok()
            .and_then(|slot| slot.clone())
    }

    /// Sign a principal in: record the identity, point the mirror at their
    /// remote record, and run the hydration pass.
    pub async fn sign_in(&self, principal: Principal) {
        set_sentry_user(&principal.user_id, Some(principal.email.as_str()));
        let user_id = principal.user_id;
        if let Ok(mut slot) = self.inner.principal.write() {
            *slot = Some(principal);
        }
        self.inner.mirror.set_user(Some(user_id));
        sync::hydrate(
            self.remote(),
            self.catalog(),
            self.collections(),
            user_id,
        )
        .await;
        tracing::info!(%user_id, "user signed in");
    }

    /// Sign the current principal out. Local collections are kept; the
    /// mirror stops receiving updates until the next sign-in.
    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.inner.principal.write() {
            *slot = None;
        }
        self.inner.mirror.set_user(None);
        clear_sentry_user();
        tracing::info!("user signed out");
    }
}
