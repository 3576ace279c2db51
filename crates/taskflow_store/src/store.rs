//! Authoritative store interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskflow_core::{Change, Resource, Snapshot};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::identity::Scope;

/// Identifies one client session, so a client can recognise its own writes on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store acknowledgement of an accepted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Tenant version after the change
    pub version: u64,
}

/// Change-feed message. Carries no payload: consumers re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub tenant_id: String,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ClientId>,
    pub resources: Vec<Resource>,
}

impl ChangeNotice {
    pub fn concerns(&self, scope: &Scope) -> bool {
        self.tenant_id == scope.tenant_id
    }

    pub fn is_from(&self, client: &ClientId) -> bool {
        self.origin.as_ref() == Some(client)
    }
}

/// Transport-neutral access to the authoritative data.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task, action and dependency visible in `scope`.
    async fn fetch(&self, scope: &Scope) -> Result<Snapshot>;

    /// Applies one change. `origin` is echoed on the change feed.
    async fn mutate(&self, scope: &Scope, change: &Change, origin: Option<&ClientId>)
    -> Result<Ack>;

    /// Change feed for the tenant of `scope`. Receivers may also see other tenants'
    /// notices and must filter with [`ChangeNotice::concerns`].
    fn subscribe(&self, scope: &Scope) -> broadcast::Receiver<ChangeNotice>;
}
