//! Domain model (IDs, kinds, payloads, records, errors).

pub mod errors;
pub mod ids;
pub mod kind;
pub mod payload;
pub mod record;
pub mod state;

pub use errors::{ErrorKind, OperationError, TaskError};
pub use ids::{ParseIdError, TaskId};
pub use kind::{TaskKind, UnknownTaskKind};
pub use payload::{
    CreateMarket, FinalizeResolution, PlaceBet, PrivateKey, ResearchAndSubmit, SubmitAnswer,
    TaskRequest,
};
pub use record::{FailureDisposition, InvalidTransition, TaskRecord};
pub use state::{TaskStatus, UnknownStatus};
