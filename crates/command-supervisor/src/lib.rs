//! command-supervisor: from interpreted user input to supervised robot actions
//!
//! The pieces, leaves first:
//! - [`ActionRegistry`]: command schemas and validation, with a typed [`Action`] per command
//! - [`CancelToken`]: the cooperative cancellation signal each task observes
//! - handlers: movement, power on, power off
//! - [`TaskSupervisor`]: the single task slot, preemption and stop
//! - [`MainLoop`]: turns input into interpreter calls and supervisor submissions

mod error;
pub use error::{CommandError, InterpreterError, Result};

pub mod schema;
pub use schema::{ArgValue, Command, Constraint, DurationSpec, ParamKind, ParamSpec, TimeUnit};

mod registry;
pub use registry::{Action, ActionRegistry, Invocation, ValidatedInvocation, DEFAULT_MAX_DURATION};

mod cancel;
pub use cancel::CancelToken;

pub mod handlers;
pub use handlers::{CommandHandler, HandlerOutcome, HandlerTimings, TaskContext};

pub mod catalog;
pub use catalog::{reference_registry, CatalogLimits};

mod supervisor;
pub use supervisor::{SlotView, StopOutcome, Submission, TaskReport, TaskStatus, TaskSupervisor};

mod interpret;
pub use interpret::{Interpretation, InterpreterClient};

mod dispatch;
pub use dispatch::{InputSource, MainLoop, OutputSink, Turn, PROMPT};
