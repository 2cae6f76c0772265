//! Edge-triggered alerting for the status poll path.

pub mod machine;
pub mod messages;

// Re-export commonly used types
pub use machine::{AlertState, AlertStateMachine, ForcedOverride, ReadCondition, StatusReport};
pub use messages::{AlertMessage, AlertTable, Severity};
