pub mod error_collector_layer;
pub mod logging;

pub use error_collector_layer::ErrorCollectorLayer;
pub use logging::{env_filter, init_tracing};
