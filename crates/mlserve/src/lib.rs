//! Single-dependency entry point for mlserve.
//!
//! `core` is the model registry and metrics recorder, `gateway` the axum
//! inference service built on them. `prelude` pulls in the types most
//! embedders touch.

pub mod core {
    pub use mlserve_core::*;
}

pub mod gateway {
    pub use mlserve_gateway::*;
}

pub mod prelude {
    pub use mlserve_core::{
        MetricsSummary, MlServeError, ModelMetrics, ModelRegistry, Prediction, Predictor,
    };
    pub use mlserve_gateway::app_state::AppState;
    pub use mlserve_gateway::config::ServiceConfig;
    pub use mlserve_gateway::router::build_router;
}
