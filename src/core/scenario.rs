use crate::core::orchestrator::Orchestrator;
use crate::error::Result;

/// A network scenario: one self-contained run against the orchestrator.
///
/// Implementations emit their own events; the engine only cares about the
/// final result.
pub trait Scenario: Send {
    fn run(&mut self, orch: &Orchestrator) -> Result<()>;
}
