//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Health check
//!
//! # Catalog
//! GET    /projects              - Catalog listing
//! POST   /projects              - Create a catalog entry (admin)
//! DELETE /projects/{id}         - Delete a catalog entry (admin)
//!
//! # Cart
//! GET    /cart                              - Cart contents
//! POST   /cart/items                        - Add a project to the cart
//! DELETE /cart/items/{id}                   - Remove a project from the cart
//! POST   /cart/items/{id}/move-to-wishlist  - Move a cart item to the wishlist
//!
//! # Wishlist
//! GET    /wishlist                          - Wishlist contents
//! POST   /wishlist/items                    - Add a project to the wishlist
//! DELETE /wishlist/items/{id}               - Remove a project from the wishlist
//! POST   /wishlist/items/{id}/move-to-cart  - Move a wishlist item to the cart
//!
//! # Checkout (requires auth)
//! POST /checkout                  - Begin a checkout for the current cart
//! POST /checkout/{id}/settlement  - Settle with a payment token
//!
//! # Account (requires auth)
//! GET /account                    - Remote record overview
//! GET /account/purchases          - Purchase history
//! GET /account/downloads/{id}     - Re-issue a download artifact
//!
//! # Session
//! PUT    /session                 - Sign in
//! DELETE /session                 - Sign out
//! ```

pub mod account;
pub mod cart;
pub mod checkout;
pub mod projects;
pub mod session;
pub mod wishlist;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(projects::index).post(projects::create))
        .route("/{id}", delete(projects::destroy))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::index))
        .route("/items", post(cart::add))
        .route("/items/{id}", delete(cart::remove))
        .route("/items/{id}/move-to-wishlist", post(cart::move_to_wishlist))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index))
        .route("/items", post(wishlist::add))
        .route("/items/{id}", delete(wishlist::remove))
        .route("/items/{id}/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::begin))
        .route("/{id}/settlement", post(checkout::settle))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/purchases", get(account::purchases))
        .route("/downloads/{id}", get(account::download))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", project_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .route("/session", put(session::sign_in).delete(session::sign_out))
}
