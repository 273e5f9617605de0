//! Remote mirror sync.
//!
//! Keeps the per-user remote record eventually consistent with the local
//! collections without ever blocking a local mutation on a network round
//! trip. Mutations enqueue [`MirrorUpdate`]s carrying the full current id
//! list; the worker upserts each list verbatim (replace, not
//! read-modify-write), so updates applied out of order still converge on the
//! last list sent.
//!
//! Everything here is best-effort and advisory: failures are logged and
//! swallowed, never retried, never surfaced to the caller.

use async_trait::async_trait;
use projecthub_core::{ProjectId, UserId};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::db::{CatalogStore, RepositoryError};
use crate::models::RemoteUserRecord;
use crate::store::{Collections, MirrorUpdate, Slot};

/// Store of per-user remote records, keyed by user id.
#[async_trait]
pub trait RemoteMirrorStore: Send + Sync {
    /// Fetch the remote record, if one exists.
    async fn fetch(&self, user_id: UserId) -> Result<Option<RemoteUserRecord>, RepositoryError>;

    /// Upsert the full id list of one collection.
    async fn replace_slot(
        &self,
        user_id: UserId,
        slot: Slot,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError>;

    /// Append project ids to the user's purchased list.
    async fn append_purchased(
        &self,
        user_id: UserId,
        ids: &[ProjectId],
    ) -> Result<(), RepositoryError>;
}

/// Drain the mirror outbox until every sender is gone.
///
/// Spawned once at startup; runs for the life of the process.
pub async fn run_mirror_worker(
    store: std::sync::Arc<dyn RemoteMirrorStore>,
    mut rx: UnboundedReceiver<MirrorUpdate>,
) {
    while let Some(update) = rx.recv().await {
        push_update(store.as_ref(), &update).await;
    }
    tracing::debug!("mirror outbox closed, worker exiting");
}

/// Apply one outbox entry to the remote store.
///
/// Failures are logged and discarded; the local collections stay
/// authoritative for the session.
pub async fn push_update(store: &dyn RemoteMirrorStore, update: &MirrorUpdate) {
    if let Err(e) = store
        .replace_slot(update.user_id, update.slot, &update.ids)
        .await
    {
        tracing::warn!(
            user_id = %update.user_id,
            slot = update.slot.column(),
            error = %e,
            "mirror write failed, dropping update"
        );
    }
}

/// Sign-in hydration pass.
///
/// Merges the remote record's ids into the local collections (union by id,
/// never dropping items already present locally), resolving remote-only ids
/// through the catalog. After the merge both lists are pushed back through
/// the outbox so the remote converges toward local state.
pub async fn hydrate(
    remote: &dyn RemoteMirrorStore,
    catalog: &dyn CatalogStore,
    collections: &Mutex<Collections>,
    user_id: UserId,
) {
    let record = match remote.fetch(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => RemoteUserRecord::default(),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "hydration fetch failed, keeping local state");
            return;
        }
    };

    for (slot, remote_ids) in [(Slot::Cart, record.cart), (Slot::Wishlist, record.wishlist)] {
        let missing: Vec<ProjectId> = {
            let guard = collections.lock().await;
            let local = guard.snapshot(slot);
            remote_ids
                .into_iter()
                .filter(|id| !local.iter().any(|item| &item.id == id))
                .collect()
        };
        if missing.is_empty() {
            continue;
        }

        match catalog.fetch_by_ids(&missing).await {
            Ok(resolved) => {
                if resolved.len() < missing.len() {
                    tracing::warn!(
                        slot = slot.column(),
                        unresolved = missing.len() - resolved.len(),
                        "remote ids missing from catalog, skipped"
                    );
                }
                collections.lock().await.merge_remote(slot, resolved);
            }
            Err(e) => {
                tracing::warn!(slot = slot.column(), error = %e, "hydration catalog lookup failed");
            }
        }
    }

    // Push the merged lists regardless of whether the remote contributed
    // anything: a local superset still has to reach the remote.
    let guard = collections.lock().await;
    for slot in [Slot::Cart, Slot::Wishlist] {
        let ids: Vec<ProjectId> = guard
            .snapshot(slot)
            .into_iter()
            .map(|item| item.id)
            .collect();
        guard.mirror().enqueue(slot, ids);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::models::Project;
    use crate::store::MirrorHandle;
    use projecthub_core::{CurrencyCode, Price};
    use rust_decimal::dec;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn project(id: &str) -> Project {
        Project {
            id: ProjectId::new(id),
            title: format!("Project {id}"),
            description: "desc".to_owned(),
            price: Price::new(dec!(10), CurrencyCode::INR),
            preview_image: "https://img.example.com/p.png".to_owned(),
            technologies: vec![],
            rating: 4.0,
        }
    }

    /// Remote store that records replaced lists, optionally failing.
    #[derive(Default)]
    struct FakeRemote {
        record: std::sync::Mutex<RemoteUserRecord>,
        replaced: std::sync::Mutex<Vec<(Slot, Vec<ProjectId>)>>,
        fail: bool,
        missing: bool,
    }

    #[async_trait]
    impl RemoteMirrorStore for FakeRemote {
        async fn fetch(&self, _: UserId) -> Result<Option<RemoteUserRecord>, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::DataCorruption("down".into()));
            }
            if self.missing {
                return Ok(None);
            }
            Ok(Some(self.record.lock().unwrap().clone()))
        }

        async fn replace_slot(
            &self,
            _: UserId,
            slot: Slot,
            ids: &[ProjectId],
        ) -> Result<(), RepositoryError> {
            if self.fail {
                return Err(RepositoryError::DataCorruption("down".into()));
            }
            self.replaced.lock().unwrap().push((slot, ids.to_vec()));
            Ok(())
        }

        async fn append_purchased(
            &self,
            _: UserId,
            _: &[ProjectId],
        ) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    /// Catalog serving a fixed set of projects.
    struct FakeCatalog(Vec<Project>);

    #[async_trait]
    impl CatalogStore for FakeCatalog {
        async fn list(&self) -> Result<Vec<Project>, RepositoryError> {
            Ok(self.0.clone())
        }

        async fn fetch_by_ids(
            &self,
            ids: &[ProjectId],
        ) -> Result<Vec<Project>, RepositoryError> {
            Ok(self
                .0
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }

        async fn insert(&self, _: &Project) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn delete(&self, _: &ProjectId) -> Result<bool, RepositoryError> {
            Ok(false)
        }
    }

    fn collections(dir: &std::path::Path) -> (Mutex<Collections>, MirrorHandle) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = MirrorHandle::new(tx);
        let cache = LocalCache::open(dir).unwrap();
        (
            Mutex::new(Collections::open(cache, handle.clone())),
            handle,
        )
    }

    #[tokio::test]
    async fn test_push_update_replaces_full_list() {
        let remote = FakeRemote::default();
        let user_id = UserId::new(Uuid::new_v4());
        let update = MirrorUpdate {
            user_id,
            slot: Slot::Cart,
            ids: vec![ProjectId::new("a"), ProjectId::new("b")],
        };

        push_update(&remote, &update).await;

        let replaced = remote.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].1, update.ids);
    }

    #[tokio::test]
    async fn test_push_update_swallows_failures() {
        let remote = FakeRemote {
            fail: true,
            ..FakeRemote::default()
        };
        let update = MirrorUpdate {
            user_id: UserId::new(Uuid::new_v4()),
            slot: Slot::Wishlist,
            ids: vec![],
        };

        // Must not panic or propagate.
        push_update(&remote, &update).await;
    }

    #[tokio::test]
    async fn test_worker_drains_outbox_in_order() {
        let remote = Arc::new(FakeRemote::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let user_id = UserId::new(Uuid::new_v4());

        for ids in [vec![ProjectId::new("a")], vec![ProjectId::new("a"), ProjectId::new("b")]] {
            tx.send(MirrorUpdate {
                user_id,
                slot: Slot::Cart,
                ids,
            })
            .unwrap();
        }
        drop(tx);

        run_mirror_worker(Arc::clone(&remote) as Arc<dyn RemoteMirrorStore>, rx).await;

        let replaced = remote.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 2);
        assert_eq!(replaced[1].1.len(), 2);
    }

    #[tokio::test]
    async fn test_hydrate_unions_without_dropping_local() {
        let dir = tempfile::tempdir().unwrap();
        let (collections, _handle) = collections(dir.path());
        collections.lock().await.add(Slot::Cart, project("local"));

        let remote = FakeRemote::default();
        remote.record.lock().unwrap().cart =
            vec![ProjectId::new("remote"), ProjectId::new("local")];
        let catalog = FakeCatalog(vec![project("remote"), project("local")]);
        let user_id = UserId::new(Uuid::new_v4());

        hydrate(&remote, &catalog, &collections, user_id).await;

        let guard = collections.lock().await;
        let ids: Vec<_> = guard.cart().iter().map(|p| p.id.as_str().to_owned()).collect();
        assert_eq!(ids, ["local", "remote"]);
    }

    #[tokio::test]
    async fn test_hydrate_skips_ids_missing_from_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let (collections, _handle) = collections(dir.path());

        let remote = FakeRemote::default();
        remote.record.lock().unwrap().wishlist =
            vec![ProjectId::new("ghost"), ProjectId::new("real")];
        let catalog = FakeCatalog(vec![project("real")]);

        hydrate(&remote, &catalog, &collections, UserId::new(Uuid::new_v4())).await;

        let guard = collections.lock().await;
        assert_eq!(guard.wishlist().len(), 1);
        assert_eq!(guard.wishlist()[0].id, ProjectId::new("real"));
    }

    #[tokio::test]
    async fn test_hydrate_pushes_merged_lists_to_outbox() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = MirrorHandle::new(tx);
        let cache = LocalCache::open(dir.path()).unwrap();
        let collections = Mutex::new(Collections::open(cache, handle.clone()));
        let user_id = UserId::new(Uuid::new_v4());
        handle.set_user(Some(user_id));

        collections.lock().await.add(Slot::Cart, project("local-only"));
        // Drain the update enqueued by the add itself.
        rx.try_recv().unwrap();

        // The remote record is empty; the merge contributes nothing, but
        // the local superset must still reach the outbox.
        let remote = FakeRemote::default();
        let catalog = FakeCatalog(vec![]);
        hydrate(&remote, &catalog, &collections, user_id).await;

        let cart_push = rx.try_recv().unwrap();
        assert_eq!(cart_push.slot, Slot::Cart);
        assert_eq!(cart_push.ids, vec![ProjectId::new("local-only")]);
        let wishlist_push = rx.try_recv().unwrap();
        assert_eq!(wishlist_push.slot, Slot::Wishlist);
        assert!(wishlist_push.ids.is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_without_remote_record_still_pushes_local() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = MirrorHandle::new(tx);
        let cache = LocalCache::open(dir.path()).unwrap();
        let collections = Mutex::new(Collections::open(cache, handle.clone()));
        let user_id = UserId::new(Uuid::new_v4());
        handle.set_user(Some(user_id));

        collections.lock().await.add(Slot::Cart, project("local-only"));
        rx.try_recv().unwrap();

        let remote = FakeRemote {
            missing: true,
            ..FakeRemote::default()
        };
        let catalog = FakeCatalog(vec![]);
        hydrate(&remote, &catalog, &collections, user_id).await;

        assert_eq!(rx.try_recv().unwrap().ids, vec![ProjectId::new("local-only")]);
    }

    #[tokio::test]
    async fn test_hydrate_failure_keeps_local_state() {
        let dir = tempfile::tempdir().unwrap();
        let (collections, _handle) = collections(dir.path());
        collections.lock().await.add(Slot::Cart, project("local"));

        let remote = FakeRemote {
            fail: true,
            ..FakeRemote::default()
        };
        let catalog = FakeCatalog(vec![]);

        hydrate(&remote, &catalog, &collections, UserId::new(Uuid::new_v4())).await;

        assert_eq!(collections.lock().await.cart().len(), 1);
    }
}
