//! Step execution.
//!
//! [`TaskGraph`] holds the steps of a run, [`AgentRegistry`] maps handler
//! names to implementations and [`WorkflowEngine`] drives the run one step
//! at a time.

pub mod engine;
pub mod graph;
pub mod registry;

pub use engine::{EngineEvent, LastError, Phase, WorkflowEngine, WorkflowState};
pub use graph::TaskGraph;
pub use registry::{AgentRegistry, HandlerKind, StepHandler};
