//! Item collection store: the cart and wishlist engine.
//!
//! Two structurally identical collections, ordered and unique by project id.
//! Every mutation updates the in-memory sequence and the durable local cache
//! synchronously (the call does not return until the cache write is durable),
//! then enqueues a best-effort mirror update for the signed-in user's remote
//! record. Local collections are authoritative for the current session; the
//! remote mirror is advisory.

use std::sync::{Arc, RwLock};

use projecthub_core::{ProjectId, UserId};
use tokio::sync::mpsc::UnboundedSender;

use crate::cache::{CART_ITEMS_KEY, LocalCache, WISHLIST_ITEMS_KEY};
use crate::models::Project;

/// Which collection a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Cart,
    Wishlist,
}

impl Slot {
    /// The durable-cache key backing this collection.
    #[must_use]
    pub const fn cache_key(self) -> &'static str {
        match self {
            Self::Cart => CART_ITEMS_KEY,
            Self::Wishlist => WISHLIST_ITEMS_KEY,
        }
    }

    /// The remote record column backing this collection.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }
}

/// One mirror write: the full current id list for one collection.
///
/// Carrying the whole list (rather than a delta) makes remote convergence
/// order-independent when responses arrive out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorUpdate {
    pub user_id: UserId,
    pub slot: Slot,
    pub ids: Vec<ProjectId>,
}

/// Handle through which collection mutations reach the mirror outbox.
///
/// Also tracks the signed-in user; with no user the remote step is skipped
/// entirely and the local cache remains the sole source of truth.
#[derive(Debug, Clone)]
pub struct MirrorHandle {
    user: Arc<RwLock<Option<UserId>>>,
    tx: UnboundedSender<MirrorUpdate>,
}

impl MirrorHandle {
    #[must_use]
    pub fn new(tx: UnboundedSender<MirrorUpdate>) -> Self {
        Self {
            user: Arc::new(RwLock::new(None)),
            tx,
        }
    }

    /// Record (or clear) the signed-in user.
    pub fn set_user(&self, user: Option<UserId>) {
        if let Ok(mut slot) = self.user.write() {
            *slot = user;
        }
    }

    /// The currently signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.user.read().ok().and_then(|slot| *slot)
    }

    /// Enqueue a full-list mirror write for the signed-in user.
    ///
    /// Fire-and-forget: a missing user skips the remote step, and a closed
    /// outbox is logged and ignored.
    pub(crate) fn enqueue(&self, slot: Slot, ids: Vec<ProjectId>) {
        let Some(user_id) = self.user() else {
            return;
        };
        let update = MirrorUpdate { user_id, slot, ids };
        if self.tx.send(update).is_err() {
            tracing::warn!(slot = slot.column(), "mirror outbox closed, update dropped");
        }
    }
}

/// The cart and wishlist collections for the current session.
///
/// Mutations run to completion one at a time (callers hold this behind a
/// mutex), so the in-memory sequences and the local cache never diverge.
pub struct Collections {
    cache: LocalCache,
    cart: Vec<Project>,
    wishlist: Vec<Project>,
    mirror: MirrorHandle,
}

impl Collections {
    /// Hydrate both collections from the durable local cache.
    ///
    /// Missing or corrupt slots hydrate as empty (never an error).
    #[must_use]
    pub fn open(cache: LocalCache, mirror: MirrorHandle) -> Self {
        let cart = cache.load(CART_ITEMS_KEY);
        let wishlist = cache.load(WISHLIST_ITEMS_KEY);
        Self {
            cache,
            cart,
            wishlist,
            mirror,
        }
    }

    /// Ordered view of the cart.
    #[must_use]
    pub fn cart(&self) -> &[Project] {
        &self.cart
    }

    /// Ordered view of the wishlist.
    #[must_use]
    pub fn wishlist(&self) -> &[Project] {
        &self.wishlist
    }

    /// Owned snapshot of a collection, reflecting the most recent completed
    /// mutation.
    #[must_use]
    pub fn snapshot(&self, slot: Slot) -> Vec<Project> {
        self.items(slot).to_vec()
    }

    /// Insert at the end unless an entry with the same id is present.
    ///
    /// Duplicates are rejected silently; the call always succeeds and always
    /// triggers persistence and mirror-sync side effects.
    pub fn add(&mut self, slot: Slot, project: Project) {
        let items = self.items_mut(slot);
        if !items.iter().any(|item| item.id == project.id) {
            items.push(project);
        }
        self.persist_and_sync(slot);
    }

    /// Remove the entry with a matching id; no-op if absent.
    pub fn remove(&mut self, slot: Slot, id: &ProjectId) {
        self.items_mut(slot).retain(|item| &item.id != id);
        self.persist_and_sync(slot);
    }

    /// Empty a collection and purge its cache slot.
    pub fn clear(&mut self, slot: Slot) {
        self.items_mut(slot).clear();
        if let Err(e) = self.cache.purge(slot.cache_key()) {
            tracing::error!(key = slot.cache_key(), error = %e, "failed to purge cache slot");
        }
        self.sync(slot);
    }

    /// Move an item from the cart to the wishlist.
    ///
    /// Composite remove-then-add behind one `&mut self` call: an observer of
    /// the collections handle never sees the item in both.
    pub fn move_to_wishlist(&mut self, project: Project) {
        let id = project.id.clone();
        self.remove(Slot::Cart, &id);
        self.add(Slot::Wishlist, project);
    }

    /// Move an item from the wishlist to the cart.
    pub fn move_to_cart(&mut self, project: Project) {
        let id = project.id.clone();
        self.remove(Slot::Wishlist, &id);
        self.add(Slot::Cart, project);
    }

    /// Union remote-only items into a collection without dropping anything
    /// already present locally, then push the merged list back out.
    pub fn merge_remote(&mut self, slot: Slot, remote_items: Vec<Project>) {
        let items = self.items_mut(slot);
        for item in remote_items {
            if !items.iter().any(|existing| existing.id == item.id) {
                items.push(item);
            }
        }
        self.persist_and_sync(slot);
    }

    /// The mirror handle shared with the sync layer.
    #[must_use]
    pub fn mirror(&self) -> &MirrorHandle {
        &self.mirror
    }

    fn items(&self, slot: Slot) -> &[Project] {
        match slot {
            Slot::Cart => &self.cart,
            Slot::Wishlist => &self.wishlist,
        }
    }

    fn items_mut(&mut self, slot: Slot) -> &mut Vec<Project> {
        match slot {
            Slot::Cart => &mut self.cart,
            Slot::Wishlist => &mut self.wishlist,
        }
    }

    /// Synchronous cache write followed by a mirror enqueue.
    ///
    /// A cache write failure is logged and contained here; it never rolls
    /// back the in-memory mutation or surfaces to the caller.
    fn persist_and_sync(&mut self, slot: Slot) {
        if let Err(e) = self.cache.store(slot.cache_key(), self.items(slot)) {
            tracing::error!(key = slot.cache_key(), error = %e, "failed to persist cache slot");
        }
        self.sync(slot);
    }

    fn sync(&self, slot: Slot) {
        let ids = self.items(slot).iter().map(|item| item.id.clone()).collect();
        self.mirror.enqueue(slot, ids);
    }
}
