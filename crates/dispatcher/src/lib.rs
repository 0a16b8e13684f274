//! # Dispatcher
//!
//! 日志发送模块。
//!
//! 负责：
//! - 生产端 `fire` 入队，队列满时静默丢弃，从不阻塞调用方
//! - 定时批量发送到单个日志流，携带序列 token
//! - 发送失败保留整批，下个周期重试
//! - `pause` / `resume` 开关，以及 tracing 钩子层

pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handle;
pub mod layer;
pub mod metrics;
pub mod queue;
pub mod sequencer;
pub mod sinks;

pub use contracts::{LogEvent, LogStreamSink, SequenceToken, ShipperConfig, StreamTarget};
pub use dispatcher::{BatchDispatcher, DispatcherOptions, TickOutcome};
pub use error::DispatcherError;
pub use gate::Gate;
pub use handle::{create_shipper, DispatcherBuilder, EventProducer, Shipper};
pub use layer::ShipperLayer;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use queue::{EventQueue, EventReceiver};
pub use sequencer::{initialize, SequencerState};
pub use sinks::{create_sink, AnySink, FileSink, FileSinkConfig, MemorySink};
