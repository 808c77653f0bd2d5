pub mod error;
pub mod events;
pub mod orchestrator;
pub mod query;
pub mod usage;

pub mod test_support;

pub use error::AgentError;
pub use events::{EventSink, TracingSink};
pub use orchestrator::{Orchestrator, Services};
pub use query::{parse_completion, AgentQuery, HttpAgentQuery};
pub use usage::{BackoffPolicy, UsageReporter, UsageSink};
