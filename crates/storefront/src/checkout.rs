//! Checkout settlement workflow.
//!
//! A checkout moves through a small state machine: it starts in
//! `AwaitingPayment` once a payment order has been registered with the
//! processor, enters `Settling` while the settlement token is being
//! processed, and ends in `Complete` or `Failed`. Terminal states are
//! sticky, so a repeated settlement call for the same checkout is
//! rejected instead of re-processed.

use chrono::Utc;
use projecthub_core::{PaymentId, Price, PriceError};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::PurchaseStore;
use crate::models::{DownloadArtifact, NewPurchase, Principal, Project};
use crate::services::{ArtifactSigner, PaymentError, PaymentOrder, PaymentProcessor};
use crate::store::{Collections, Slot};
use crate::sync::RemoteMirrorStore;

/// Lifecycle of a single checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    /// Payment order registered with the processor, waiting for a token.
    AwaitingPayment,
    /// Settlement token received, grants being recorded.
    Settling,
    /// Purchases recorded and artifacts issued.
    Complete,
    /// Settlement was rejected or grant recording failed.
    Failed,
}

/// Errors produced by the checkout workflow.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("cannot check out an empty cart")]
    EmptyCart,
    #[error("checkout requires a signed-in user")]
    NotSignedIn,
    #[error("failed to register payment order")]
    PaymentInit(#[source] PaymentError),
    #[error("cart total could not be computed: {0}")]
    Total(#[from] PriceError),
    #[error("checkout has already been settled")]
    AlreadySettled,
    #[error("settlement token was already used for this user")]
    DuplicateSettlement,
    #[error("settlement processing failed, contact support")]
    Processing,
}

/// A checkout in progress for a signed-in user.
#[derive(Debug)]
pub struct Checkout {
    id: Uuid,
    user: Principal,
    items: Vec<Project>,
    amount_minor: i64,
    currency: projecthub_core::CurrencyCode,
    state: CheckoutState,
    provider_ref: String,
}

impl Checkout {
    /// Begin a checkout for the given items.
    ///
    /// Totals the item prices, registers a payment order with the
    /// processor, and returns a checkout in `AwaitingPayment`. Nothing is
    /// recorded locally or remotely at this stage.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` if `items` is empty, `NotSignedIn` if there is
    /// no principal, `Total` if item currencies disagree or the total
    /// overflows, and `PaymentInit` if the processor rejects the order.
    pub async fn begin(
        principal: Option<Principal>,
        items: Vec<Project>,
        currency: projecthub_core::CurrencyCode,
        processor: &dyn PaymentProcessor,
    ) -> Result<Self, CheckoutError> {
        let user = principal.ok_or(CheckoutError::NotSignedIn)?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut total = Price::zero(currency);
        for item in &items {
            total = total.checked_add(item.price)?;
        }
        let amount_minor = total.to_minor_units()?;

        let id = Uuid::new_v4();
        let order = PaymentOrder {
            reference: id.to_string(),
            amount_minor,
            currency,
            payer_email: user.email.clone(),
        };
        let provider_ref = processor
            .initiate(&order)
            .await
            .map_err(CheckoutError::PaymentInit)?;

        tracing::info!(
            checkout_id = %id,
            user_id = %user.user_id,
            amount_minor,
            items = items.len(),
            "checkout started"
        );

        Ok(Self {
            id,
            user,
            items,
            amount_minor,
            currency,
            state: CheckoutState::AwaitingPayment,
            provider_ref,
        })
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> CheckoutState {
        self.state
    }

    #[must_use]
    pub const fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    #[must_use]
    pub const fn currency(&self) -> projecthub_core::CurrencyCode {
        self.currency
    }

    /// Reference returned by the payment processor when the order was
    /// registered. The storefront UI hands this to the processor's
    /// checkout flow.
    #[must_use]
    pub fn provider_ref(&self) -> &str {
        &self.provider_ref
    }

    /// Settle the checkout with a payment token.
    ///
    /// Runs the settlement sequence: reject reused tokens, record one
    /// purchase row per item, issue a signed download artifact per item,
    /// append the items to the user's remote purchased list (best
    /// effort), and clear the cart. Purchase rows are the source of truth
    /// for ownership; a failure after they are written leaves them in
    /// place and surfaces a support-facing error.
    ///
    /// # Errors
    ///
    /// Returns `AlreadySettled` if the checkout is not awaiting payment,
    /// `DuplicateSettlement` if the token was already recorded for this
    /// user, and `Processing` if recording or artifact issuance fails.
    pub async fn settle(
        &mut self,
        token: PaymentId,
        purchases: &dyn PurchaseStore,
        signer: &dyn ArtifactSigner,
        remote: &dyn RemoteMirrorStore,
        collections: &Mutex<Collections>,
    ) -> Result<Vec<DownloadArtifact>, CheckoutError> {
        if self.state != CheckoutState::AwaitingPayment {
            return Err(CheckoutError::AlreadySettled);
        }
        self.state = CheckoutState::Settling;

        let recorded = purchases
            .payment_recorded(self.user.user_id, &token)
            .await
            .map_err(|error| {
                tracing::error!(%error, checkout_id = %self.id, "settlement token lookup failed");
                self.state = CheckoutState::Failed;
                CheckoutError::Processing
            })?;
        if recorded {
            self.state = CheckoutState::Failed;
            tracing::warn!(
                checkout_id = %self.id,
                user_id = %self.user.user_id,
                "settlement token replayed"
            );
            return Err(CheckoutError::DuplicateSettlement);
        }

        let rows: Vec<NewPurchase> = self
            .items
            .iter()
            .map(|item| NewPurchase {
                user_id: self.user.user_id,
                project_id: item.id.clone(),
                amount: item.price.amount,
                payment_id: token.clone(),
            })
            .collect();
        if let Err(error) = purchases.insert_batch(&rows).await {
            tracing::error!(
                %error,
                checkout_id = %self.id,
                user_id = %self.user.user_id,
                payment_id = %token,
                "failed to record purchases for settled payment"
            );
            self.state = CheckoutState::Failed;
            return Err(CheckoutError::Processing);
        }

        let mut artifacts = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match signer.sign(&item.id) {
                Ok(artifact) => artifacts.push(artifact),
                Err(error) => {
                    // Purchases are already recorded; support resolves
                    // access from the payment id.
                    tracing::error!(
                        %error,
                        checkout_id = %self.id,
                        user_id = %self.user.user_id,
                        payment_id = %token,
                        project_id = %item.id,
                        "purchase recorded but artifact issuance failed"
                    );
                    self.state = CheckoutState::Failed;
                    return Err(CheckoutError::Processing);
                }
            }
        }

        let ids: Vec<_> = self.items.iter().map(|item| item.id.clone()).collect();
        if let Err(error) = remote.append_purchased(self.user.user_id, &ids).await {
            tracing::warn!(
                %error,
                checkout_id = %self.id,
                "remote purchased list not updated"
            );
        }

        collections.lock().await.clear(Slot::Cart);

        self.state = CheckoutState::Complete;
        tracing::info!(
            checkout_id = %self.id,
            user_id = %self.user.user_id,
            artifacts = artifacts.len(),
            settled_at = %Utc::now(),
            "checkout complete"
        );
        Ok(artifacts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use projecthub_core::{CurrencyCode, Email, Price, ProjectId, UserId};
    use rust_decimal::dec;
    use tokio::sync::mpsc;

    use super::*;
    use crate::cache::LocalCache;
    use crate::db::RepositoryError;
    use crate::models::{Purchase, RemoteUserRecord};
    use crate::services::SignerError;
    use crate::store::MirrorHandle;

    fn principal() -> Principal {
        Principal {
            user_id: UserId::new(Uuid::new_v4()),
            email: "buyer@example.com".parse::<Email>().unwrap(),
            is_admin: false,
        }
    }

    fn project(id: &str, amount: rust_decimal::Decimal) -> Project {
        Project {
            id: ProjectId::from(id),
            title: format!("Project {id}"),
            description: "A bundle".to_string(),
            price: Price::new(amount, CurrencyCode::INR),
            preview_image: "https://img.example.com/p.png".to_string(),
            technologies: vec!["rust".to_string()],
            rating: 4.5,
        }
    }

    struct FakeProcessor {
        fail: bool,
    }

    #[async_trait]
    impl PaymentProcessor for FakeProcessor {
        async fn initiate(&self, order: &PaymentOrder) -> Result<String, PaymentError> {
            if self.fail {
                return Err(PaymentError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(format!("order_{}", order.reference))
        }
    }

    #[derive(Default)]
    struct FakePurchases {
        rows: StdMutex<Vec<NewPurchase>>,
        fail_insert: AtomicBool,
    }

    #[async_trait]
    impl PurchaseStore for FakePurchases {
        async fn payment_recorded(
            &self,
            user_id: UserId,
            payment_id: &PaymentId,
        ) -> Result<bool, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .any(|r| r.user_id == user_id && r.payment_id == *payment_id))
        }

        async fn insert_batch(&self, purchases: &[NewPurchase]) -> Result<(), RepositoryError> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(RepositoryError::DataCorruption("write failed".to_string()));
            }
            self.rows.lock().unwrap().extend_from_slice(purchases);
            Ok(())
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| Purchase {
                    user_id: r.user_id,
                    project_id: r.project_id.clone(),
                    amount: r.amount,
                    payment_id: r.payment_id.clone(),
                    created_at: Utc::now(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        appended: StdMutex<Vec<ProjectId>>,
        fail_append: AtomicBool,
    }

    #[async_trait]
    impl RemoteMirrorStore for FakeRemote {
        async fn fetch(
            &self,
            _user_id: UserId,
        ) -> Result<Option<RemoteUserRecord>, RepositoryError> {
            Ok(Some(RemoteUserRecord::default()))
        }

        async fn replace_slot(
            &self,
            _user_id: UserId,
            _slot: Slot,
            _ids: &[ProjectId],
        ) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn append_purchased(
            &self,
            _user_id: UserId,
            ids: &[ProjectId],
        ) -> Result<(), RepositoryError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(RepositoryError::DataCorruption("offline".to_string()));
            }
            self.appended.lock().unwrap().extend_from_slice(ids);
            Ok(())
        }
    }

    struct FakeSigner {
        fail: bool,
    }

    impl ArtifactSigner for FakeSigner {
        fn sign(&self, project_id: &ProjectId) -> Result<DownloadArtifact, SignerError> {
            if self.fail {
                return Err(SignerError::ExpiryOutOfRange);
            }
            Ok(DownloadArtifact {
                project_id: project_id.clone(),
                download_url: format!("https://dl.example.com/{project_id}"),
                expires_in_seconds: 3600,
            })
        }
    }

    fn collections() -> (tempfile::TempDir, Mutex<Collections>) {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cache = LocalCache::open(dir.path()).unwrap();
        let store = Collections::open(cache, MirrorHandle::new(tx));
        (dir, Mutex::new(store))
    }

    #[tokio::test]
    async fn test_begin_rejects_empty_cart() {
        let processor = FakeProcessor { fail: false };
        let result =
            Checkout::begin(Some(principal()), vec![], CurrencyCode::INR, &processor).await;
        assert!(matches!(result.unwrap_err(), CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_begin_rejects_signed_out() {
        let processor = FakeProcessor { fail: false };
        let items = vec![project("p1", dec!(10))];
        let result = Checkout::begin(None, items, CurrencyCode::INR, &processor).await;
        assert!(matches!(result.unwrap_err(), CheckoutError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_begin_totals_in_minor_units() {
        let processor = FakeProcessor { fail: false };
        let items = vec![project("p1", dec!(10)), project("p2", dec!(15))];
        let checkout = Checkout::begin(Some(principal()), items, CurrencyCode::INR, &processor)
            .await
            .unwrap();

        assert_eq!(checkout.amount_minor(), 2500);
        assert_eq!(checkout.state(), CheckoutState::AwaitingPayment);
        assert!(checkout.provider_ref().starts_with("order_"));
    }

    #[tokio::test]
    async fn test_begin_surfaces_processor_failure() {
        let processor = FakeProcessor { fail: true };
        let items = vec![project("p1", dec!(10))];
        let result = Checkout::begin(Some(principal()), items, CurrencyCode::INR, &processor).await;
        assert!(matches!(result.unwrap_err(), CheckoutError::PaymentInit(_)));
    }

    #[tokio::test]
    async fn test_settle_records_purchases_and_issues_artifacts() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let items = vec![project("p1", dec!(10)), project("p2", dec!(15))];
        let mut checkout =
            Checkout::begin(Some(principal()), items, CurrencyCode::INR, &processor)
                .await
                .unwrap();

        let artifacts = checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(checkout.state(), CheckoutState::Complete);
        assert_eq!(purchases.rows.lock().unwrap().len(), 2);
        assert_eq!(remote.appended.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settle_clears_cart() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let item = project("p1", dec!(10));
        {
            let mut store = collections.lock().await;
            store.add(Slot::Cart, item.clone());
            assert_eq!(store.cart().len(), 1);
        }

        let mut checkout =
            Checkout::begin(Some(principal()), vec![item], CurrencyCode::INR, &processor)
                .await
                .unwrap();
        checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await
            .unwrap();

        assert!(collections.lock().await.cart().is_empty());
    }

    #[tokio::test]
    async fn test_settle_rejects_replayed_token() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();
        let user = principal();

        let mut first = Checkout::begin(
            Some(user.clone()),
            vec![project("p1", dec!(10))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        first
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await
            .unwrap();

        let mut second = Checkout::begin(
            Some(user),
            vec![project("p2", dec!(15))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        let result = second
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await;

        assert!(matches!(
            result.unwrap_err(),
            CheckoutError::DuplicateSettlement
        ));
        assert_eq!(second.state(), CheckoutState::Failed);
        // The replay recorded nothing new.
        assert_eq!(purchases.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_is_not_repeatable() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let mut checkout = Checkout::begin(
            Some(principal()),
            vec![project("p1", dec!(10))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await
            .unwrap();

        let result = checkout
            .settle(
                PaymentId::from("pay_def"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await;
        assert!(matches!(result.unwrap_err(), CheckoutError::AlreadySettled));
        assert_eq!(checkout.state(), CheckoutState::Complete);
    }

    #[tokio::test]
    async fn test_settle_fails_when_purchase_write_fails() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        purchases.fail_insert.store(true, Ordering::SeqCst);
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let mut checkout = Checkout::begin(
            Some(principal()),
            vec![project("p1", dec!(10))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        let result = checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await;

        assert!(matches!(result.unwrap_err(), CheckoutError::Processing));
        assert_eq!(checkout.state(), CheckoutState::Failed);
    }

    #[tokio::test]
    async fn test_failed_settlement_leaves_cart_intact() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        purchases.fail_insert.store(true, Ordering::SeqCst);
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let item = project("p1", dec!(10));
        collections.lock().await.add(Slot::Cart, item.clone());

        let mut checkout =
            Checkout::begin(Some(principal()), vec![item], CurrencyCode::INR, &processor)
                .await
                .unwrap();
        let result = checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await;

        assert!(matches!(result.unwrap_err(), CheckoutError::Processing));
        // The cart survives a failed settlement so the shopper can retry.
        assert_eq!(collections.lock().await.cart().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_keeps_purchases_when_signing_fails() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        let signer = FakeSigner { fail: true };
        let (_dir, collections) = collections();

        let mut checkout = Checkout::begin(
            Some(principal()),
            vec![project("p1", dec!(10))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        let result = checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await;

        assert!(matches!(result.unwrap_err(), CheckoutError::Processing));
        assert_eq!(checkout.state(), CheckoutState::Failed);
        // Ownership is already recorded; support resolves from here.
        assert_eq!(purchases.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_completes_when_remote_append_fails() {
        let processor = FakeProcessor { fail: false };
        let purchases = FakePurchases::default();
        let remote = FakeRemote::default();
        remote.fail_append.store(true, Ordering::SeqCst);
        let signer = FakeSigner { fail: false };
        let (_dir, collections) = collections();

        let mut checkout = Checkout::begin(
            Some(principal()),
            vec![project("p1", dec!(10))],
            CurrencyCode::INR,
            &processor,
        )
        .await
        .unwrap();
        let artifacts = checkout
            .settle(
                PaymentId::from("pay_abc"),
                &purchases,
                &signer,
                &remote,
                &collections,
            )
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(checkout.state(), CheckoutState::Complete);
    }
}
