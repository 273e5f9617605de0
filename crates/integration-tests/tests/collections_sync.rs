//! Collections durability and mirror sync scenarios.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use projecthub_core::ProjectId;
use projecthub_integration_tests::{
    InMemoryCatalog, InMemoryRemote, buyer, collections_at, fresh_collections, project,
};
use projecthub_storefront::store::Slot;
use projecthub_storefront::sync::{RemoteMirrorStore, hydrate, run_mirror_worker};
use rust_decimal::dec;

#[tokio::test]
async fn test_collections_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let (collections, _mirror, _rx) = collections_at(dir.path());
        let mut c = collections.lock().await;
        c.add(Slot::Cart, project("chat-app", dec!(10)));
        c.add(Slot::Wishlist, project("game", dec!(99)));
        c.add(Slot::Cart, project("blog-engine", dec!(15)));
        c.remove(Slot::Cart, &ProjectId::new("chat-app"));
    }

    // A new process over the same cache directory sees the final state.
    let (collections, _mirror, _rx) = collections_at(dir.path());
    let c = collections.lock().await;
    let cart_ids: Vec<_> = c.cart().iter().map(|p| p.id.clone()).collect();
    assert_eq!(cart_ids, vec![ProjectId::new("blog-engine")]);
    assert_eq!(c.wishlist().len(), 1);
}

#[tokio::test]
async fn test_mirror_worker_replays_full_lists() {
    let (_dir, collections, mirror, rx) = fresh_collections();
    let remote = Arc::new(InMemoryRemote::default());
    let user = buyer();
    mirror.set_user(Some(user.user_id));

    {
        let mut c = collections.lock().await;
        c.add(Slot::Cart, project("chat-app", dec!(10)));
        c.add(Slot::Cart, project("blog-engine", dec!(15)));
        c.remove(Slot::Cart, &ProjectId::new("chat-app"));
    }

    // Drop every sender so the worker drains the backlog and exits.
    drop(collections);
    drop(mirror);
    run_mirror_worker(
        Arc::clone(&remote) as Arc<dyn RemoteMirrorStore>,
        rx,
    )
    .await;

    // Each update carried the full list; the remote converged on the last.
    let record = remote.record.lock().unwrap().clone();
    assert_eq!(record.cart, vec![ProjectId::new("blog-engine")]);
}

#[tokio::test]
async fn test_hydration_unions_remote_into_local() {
    let (_dir, collections, _mirror, _rx) = fresh_collections();
    let user = buyer();

    let local_only = project("local-only", dec!(5));
    collections.lock().await.add(Slot::Cart, local_only);

    // The remote record knows two ids; one resolves through the catalog,
    // one is stale.
    let remote = InMemoryRemote::default();
    remote.record.lock().unwrap().cart =
        vec![ProjectId::new("remote-only"), ProjectId::new("deleted")];
    let catalog = InMemoryCatalog::with_projects(vec![project("remote-only", dec!(7))]);

    hydrate(&remote, &catalog, &collections, user.user_id).await;

    // Local items first, resolvable remote items appended, stale ids
    // skipped.
    let c = collections.lock().await;
    let ids: Vec<_> = c.cart().iter().map(|p| p.id.clone()).collect();
    assert_eq!(
        ids,
        vec![ProjectId::new("local-only"), ProjectId::new("remote-only")]
    );
}

#[tokio::test]
async fn test_hydration_converges_remote_to_local_superset() {
    let (_dir, collections, mirror, rx) = fresh_collections();
    let user = buyer();
    mirror.set_user(Some(user.user_id));

    // The local cart is a strict superset of the (empty) remote record.
    collections
        .lock()
        .await
        .add(Slot::Cart, project("local-only", dec!(5)));

    let remote = Arc::new(InMemoryRemote::default());
    let catalog = InMemoryCatalog::default();
    hydrate(remote.as_ref(), &catalog, &collections, user.user_id).await;

    // Drain the outbox; the remote must end up holding the local list.
    drop(collections);
    drop(mirror);
    run_mirror_worker(
        Arc::clone(&remote) as Arc<dyn RemoteMirrorStore>,
        rx,
    )
    .await;

    let record = remote.record.lock().unwrap().clone();
    assert_eq!(record.cart, vec![ProjectId::new("local-only")]);
}

#[tokio::test]
async fn test_hydration_outage_keeps_local_state() {
    let (_dir, collections, _mirror, _rx) = fresh_collections();
    collections
        .lock()
        .await
        .add(Slot::Cart, project("chat-app", dec!(10)));

    let remote = InMemoryRemote::default();
    remote.set_offline(true);
    let catalog = InMemoryCatalog::default();

    hydrate(&remote, &catalog, &collections, buyer().user_id).await;

    assert_eq!(collections.lock().await.cart().len(), 1);
}

#[tokio::test]
async fn test_signed_out_sessions_never_reach_the_mirror() {
    let (_dir, collections, mirror, mut rx) = fresh_collections();

    collections
        .lock()
        .await
        .add(Slot::Cart, project("chat-app", dec!(10)));
    assert!(rx.try_recv().is_err());

    // Signing in starts mirroring from the next mutation.
    mirror.set_user(Some(buyer().user_id));
    collections
        .lock()
        .await
        .add(Slot::Cart, project("blog-engine", dec!(15)));
    let update = rx.try_recv().unwrap();
    assert_eq!(update.ids.len(), 2);
}
