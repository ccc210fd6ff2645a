use std::sync::Arc;

use crate::services::pipeline::EstimationPipeline;

/// Handler state. The pipeline is immutable, so handlers only ever read it.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EstimationPipeline>,
}

impl AppState {
    pub fn new(pipeline: EstimationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}
