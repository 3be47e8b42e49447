pub mod error;
pub mod pipeline;
pub mod stage;
pub mod storage;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineRun};
pub use stage::{Stage, StageAction};
pub use storage::{InMemorySessionStore, Session, SessionStore};
