//! Timed and counted call interception.
//!
//! Measures the latency and outcome of a unit of work — a plain call, a
//! future, or a stream — exactly once per logical invocation, and publishes
//! through an explicit metrics sink. The interception layer never changes
//! what the caller observes: results and errors pass through untouched, and
//! every sink failure is swallowed.

pub mod context;
pub mod counter;
pub mod descriptor;
pub mod future;
pub mod outcome;
pub mod registry;
pub mod stream;
pub mod timer;

mod sample;

pub use context::CallContext;
pub use counter::{CountDescriptor, InvocationCounter, RESULT_TAG};
pub use descriptor::InvocationDescriptor;
pub use future::TimedFuture;
pub use outcome::{error_class, CompletionError, OUTCOME_NONE, OUTCOME_TAG};
pub use registry::DescriptorRegistry;
pub use stream::TimedStream;
pub use timer::InvocationTimer;
