//! Control dispatcher, control-channel adapter, and HTTP diagnostic endpoint
//! for the stage-1 call routing engine.

pub mod config;
pub mod control_channel;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod wire;

pub use config::SwitchboardConfig;
pub use dispatcher::{Dispatcher, DiagnosticResult, RoutingResponse, RoutingStatus};
pub use metrics::Metrics;
