//! Background decoding of live frames

pub mod mailbox;
pub mod processor;
pub mod stats;

pub use mailbox::Mailbox;
pub use processor::FrameProcessor;
pub use stats::{DecodeTimings, ProcessorStats, StatsSnapshot};
