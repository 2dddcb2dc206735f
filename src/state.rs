use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::events::EventBus;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub bus: Arc<dyn EventBus>,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RecordStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<dyn EventBus> {
    fn from_ref(state: &AppState) -> Self {
        state.bus.clone()
    }
}
