//! Shared application state for the gateway

use roomsync_sync::SyncEngine;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct GatewayState {
    pub engine: SyncEngine,
}

impl GatewayState {
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }
}
