//! Shared state for axum handlers.

use std::sync::Arc;

use pulse_search::PulseService;

#[derive(Clone)]
pub struct AppState {
    /// One engine instance shared by every request.
    pub service: Arc<PulseService>,
}

impl AppState {
    pub fn new(service: PulseService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
