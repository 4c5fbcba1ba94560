//! Domain model (ids, task vocabulary, units, body parts, decisions, config, errors).

pub mod body;
pub mod config;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod task;
pub mod unit;

pub use body::{BodyPart, PartCosts, count_parts};
pub use config::{ColonyConfig, ProgressLimits};
pub use decision::{DecisionRecord, StepOutcome};
pub use errors::{BindRejection, ColonyError};
pub use ids::{EntityId, Id, IdMarker, TaskId, UnitId};
pub use task::{Priority, Role, Scope, SpawnOrder, TaskDescriptor, TaskKind};
pub use unit::{
    CollectMethod, DeliverMethod, ExecutionPhase, TaxiPhase, TransferPhase, Unit, WorkPhase,
};
