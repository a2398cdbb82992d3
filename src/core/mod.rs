pub mod engine;
pub mod event;
pub mod fsm;
pub mod orchestrator;
pub mod scenario;
pub mod sink;
pub mod snapshot;
pub mod timeline;

pub use engine::Engine;
pub use event::{Event, EventType, SessionId};
pub use fsm::{FsmManager, LifeState, LifecycleFsm};
pub use orchestrator::Orchestrator;
pub use scenario::Scenario;
pub use sink::{ConsoleSink, EventSink, Metrics, MetricsSink, QueueSink};
pub use snapshot::EventSnapshot;
pub use timeline::Timeline;
