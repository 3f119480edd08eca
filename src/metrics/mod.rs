pub mod emitter;
pub mod monitor;
pub mod snapshot;
pub mod window;

pub use emitter::{spawn_publisher, LogSink, MetricsBatch, MetricsEmitter};
pub use monitor::{MonitorError, PerformanceMonitor};
pub use snapshot::{Snapshot, Status};
