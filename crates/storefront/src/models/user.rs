//! Principal and remote user record types.

use chrono::{DateTime, Utc};
use projecthub_core::{Email, ProjectId, UserId};
use serde::{Deserialize, Serialize};

/// The signed-in user, as supplied by the external identity provider.
///
/// Read-only inside this crate; mutation is the exclusive responsibility of
/// the identity-provider collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Email,
    #[serde(default)]
    pub is_admin: bool,
}

/// Server-held shadow of a signed-in user's collections.
///
/// Holds project ids, not full records. A best-effort mirror of the local
/// collections: the two may diverge transiently and are reconciled toward
/// local state by a sync pass, never the reverse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteUserRecord {
    pub cart: Vec<ProjectId>,
    pub wishlist: Vec<ProjectId>,
    pub purchased_projects: Vec<ProjectId>,
    pub messages: Vec<Message>,
}

/// A message stored on the remote user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}
