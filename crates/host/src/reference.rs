use crate::client::RpcClient;
use phantom_core::protocol::RefRequest;
use std::fmt;

/// Host-side proxy for an object living in the engine's registry.
///
/// Holds no cached state: every read is a fresh round trip. Two refs are
/// equal when their IDs are equal.
#[derive(Clone)]
pub struct Ref {
    client: RpcClient,
    id: String,
}

impl Ref {
    pub(crate) fn new(client: RpcClient, id: String) -> Self {
        Self { client, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn client(&self) -> &RpcClient {
        &self.client
    }

    pub(crate) fn request(&self) -> RefRequest {
        RefRequest::new(self.id.clone())
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Ref {}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("url", &self.client.base_url())
            .finish()
    }
}
