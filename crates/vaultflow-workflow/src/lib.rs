//! Workflow engine for Vaultflow.
//!
//! Work items are markdown records that move between vault folders.
//! Watchers react to arrivals, the reasoning loop turns tasks into plans,
//! and the executor runs approved plans behind rate limits and circuit
//! breakers.

pub mod capability;
pub mod circuit_breaker;
pub mod error;
pub mod executor;
pub mod planner;
pub mod rate_limiter;
pub mod reasoning;
pub mod record;
pub mod types;
pub mod watcher;

pub use capability::{
    DeliveryOutcome, EmailRequest, EmailSender, InboundMailSource, InboundMessage, SocialPost,
    SocialPoster,
};
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{Result, WorkflowError};
pub use executor::{ExecutionReport, FileActionRunner, NoopFileActions, PlanExecutor};
pub use planner::{Plan, PlanGenerator, PlanRouter};
pub use rate_limiter::{Admission, RateLimiter};
pub use reasoning::{LoopReport, ReasoningLoop};
pub use record::{Metadata, Record, RecordStore};
pub use types::{
    ActionType, ExecutionStatus, ParsedStep, Step, StepErrorCode, StepResult, TaskStatus,
};
pub use watcher::{FileEvent, FileEventKind, FileHandler, Watcher, WatcherConfig, WatcherStatus};
