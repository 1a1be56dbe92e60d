//! The blackboard, the contributor trait/orchestrator, and the built-in
//! contributor catalog (§4.5, §5).

pub mod blackboard;
pub mod catalog;
pub mod framework;

pub use blackboard::RequestBlackboard;
pub use framework::{run_waves, run_waves_weighted, Contributor, OrchestrationOutcome, TriggerCondition};
