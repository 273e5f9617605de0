//! Integration tests for ProjectHub.
//!
//! The scenarios in `tests/` exercise the storefront engine end to end
//! (collections, mirror sync, checkout settlement) against the in-memory
//! collaborators defined here. No network or database is required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p projecthub-integration-tests
//! ```

#![allow(clippy::unwrap_used)]

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use projecthub_core::{CurrencyCode, Email, PaymentId, Price, ProjectId, UserId};
use projecthub_storefront::cache::LocalCache;
use projecthub_storefront::db::{CatalogStore, PurchaseStore, RepositoryError};
use projecthub_storefront::models::{
    DownloadArtifact, NewPurchase, Principal, Project, Purchase, RemoteUserRecord,
};
use projecthub_storefront::services::{
    ArtifactSigner, PaymentError, PaymentOrder, PaymentProcessor, SignerError,
};
use projecthub_storefront::store::{Collections, MirrorHandle, MirrorUpdate, Slot};
use projecthub_storefront::sync::RemoteMirrorStore;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

/// A catalog project fixture.
#[must_use]
pub fn project(id: &str, amount: Decimal) -> Project {
    Project {
        id: ProjectId::new(id),
        title: format!("Project {id}"),
        description: "A complete project bundle".to_owned(),
        price: Price::new(amount, CurrencyCode::INR),
        preview_image: format!("https://img.example.com/{id}.png"),
        technologies: vec!["rust".to_owned()],
        rating: 4.2,
    }
}

/// A signed-in user fixture.
#[must_use]
pub fn buyer() -> Principal {
    Principal {
        user_id: UserId::new(Uuid::new_v4()),
        email: "buyer@example.com".parse::<Email>().unwrap(),
        is_admin: false,
    }
}

/// In-memory catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    projects: StdMutex<Vec<Project>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn with_projects(projects: Vec<Project>) -> Self {
        Self {
            projects: StdMutex::new(projects),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list(&self) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn fetch_by_ids(&self, ids: &[ProjectId]) -> Result<Vec<Project>, RepositoryError> {
        let projects = self.projects.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| projects.iter().find(|p| &p.id == id).cloned())
            .collect())
    }

    async fn insert(&self, project: &Project) -> Result<(), RepositoryError> {
        self.projects.lock().unwrap().push(project.clone());
        Ok(())
    }

    async fn delete(&self, id: &ProjectId) -> Result<bool, RepositoryError> {
        let mut projects = self.projects.lock().unwrap();
        let before = projects.len();
        projects.retain(|p| &p.id != id);
        Ok(projects.len() < before)
    }
}

/// In-memory append-only purchase store.
#[derive(Default)]
pub struct InMemoryPurchases {
    pub rows: StdMutex<Vec<NewPurchase>>,
}

#[async_trait]
impl PurchaseStore for InMemoryPurchases {
    async fn payment_recorded(
        &self,
        user_id: UserId,
        payment_id: &PaymentId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.user_id == user_id && r.payment_id == *payment_id))
    }

    async fn insert_batch(&self, purchases: &[NewPurchase]) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().extend_from_slice(purchases);
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| Purchase {
                user_id: r.user_id,
                project_id: r.project_id.clone(),
                amount: r.amount,
                payment_id: r.payment_id.clone(),
                created_at: chrono_now(),
            })
            .collect())
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// In-memory remote mirror, one record per user.
#[derive(Default)]
pub struct InMemoryRemote {
    pub record: StdMutex<RemoteUserRecord>,
    pub offline: AtomicBool,
}

impl InMemoryRemote {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption("mirror offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteMirrorStore for InMemoryRemote {
    async fn fetch(&self, _user_id: UserId) -> Result<Option<RemoteUserRecord>, RepositoryError> {
        self.check_online()?;
        Ok(Some(self.record.lock().unwrap().clone()))
    }

    async fn replace_slot(
        &self,
        _user_id: UserId,
        slot: Slot,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError> {
        self.check_online()?;
        let mut record = self.record.lock().unwrap();
        match slot {
            Slot::Cart => record.cart = ids.to_vec(),
            Slot::Wishlist => record.wishlist = ids.to_vec(),
        }
        Ok(())
    }

    async fn append_purchased(
        &self,
        _user_id: UserId,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError> {
        self.check_online()?;
        self.record
            .lock()
            .unwrap()
            .purchased_projects
            .extend_from_slice(ids);
        Ok(())
    }
}

/// Payment processor that always registers an order.
#[derive(Default)]
pub struct AcceptingProcessor;

#[async_trait]
impl PaymentProcessor for AcceptingProcessor {
    async fn initiate(&self, order: &PaymentOrder) -> Result<String, PaymentError> {
        Ok(format!("order_{}", order.reference))
    }
}

/// Signer that issues one-hour artifacts without key material.
#[derive(Default)]
pub struct StaticSigner;

impl ArtifactSigner for StaticSigner {
    fn sign(&self, project_id: &ProjectId) -> Result<DownloadArtifact, SignerError> {
        Ok(DownloadArtifact {
            project_id: project_id.clone(),
            download_url: format!("https://dl.example.com/{project_id}/project-files.zip"),
            expires_in_seconds: 3600,
        })
    }
}

/// Collections wired to a fresh temp-dir cache and a live outbox receiver.
///
/// Keep the returned `TempDir` alive for the duration of the scenario.
#[must_use]
pub fn fresh_collections() -> (
    tempfile::TempDir,
    Mutex<Collections>,
    MirrorHandle,
    UnboundedReceiver<MirrorUpdate>,
) {
    let dir = tempfile::tempdir().unwrap();
    let (collections, mirror, rx) = collections_at(dir.path());
    (dir, collections, mirror, rx)
}

/// Collections over an existing cache directory, as after a process restart.
#[must_use]
pub fn collections_at(
    dir: &std::path::Path,
) -> (
    Mutex<Collections>,
    MirrorHandle,
    UnboundedReceiver<MirrorUpdate>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mirror = MirrorHandle::new(tx);
    let cache = LocalCache::open(dir).unwrap();
    (
        Mutex::new(Collections::open(cache, mirror.clone())),
        mirror,
        rx,
    )
}
