pub mod gap_filler;
pub mod pipeline;
pub mod reconciler;

pub use gap_filler::{GapFiller, RecordSink};
pub use pipeline::{PipelineOutcome, SyncPipeline, UpdatePolicy};
pub use reconciler::Reconciler;
