//! EEG-Stream: Fixed-cadence window scheduling and result fan-out
//!
//! The scheduler pulls windows from a `SignalBuffer`, runs the DSP pipeline,
//! asks an external classifier for a label and hands the result to every
//! subscriber of the publisher.

pub mod classifier;
pub mod config;
pub mod publisher;
pub mod scheduler;

pub use classifier::{ClassificationAdapter, Classifier, FnClassifier};
pub use config::StreamConfig;
pub use publisher::{
    ChannelSink, PublishReport, Published, ResultSink, SinkError, StreamPublisher, SubscriberId, Subscription,
};
pub use scheduler::{SchedulerState, SchedulerStats, TickGrid, WindowScheduler};
