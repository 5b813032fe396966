//! Entity and status vocabulary for the orchestration pipeline.
//!
//! Every enum here is a closed set; transitions between status values live
//! in [`transitions`], not scattered across callers, so invariants like
//! "a terminal status never moves" are enforced in one place.

pub mod config;
pub mod deployment;
pub mod event;
pub mod pool;
pub mod run;
pub mod session;
pub mod stats;
pub mod transitions;
pub mod worker;

pub use config::{BrowserRequest, DeploymentConfig, Screen};
pub use deployment::{Deployment, DeploymentStatus};
pub use event::{SessionEvent, SessionEventKind};
pub use pool::WorkPool;
pub use run::{DeploymentRun, RunStatus};
pub use session::{ResourceLimits, Session, SessionStatus};
pub use stats::DeploymentStats;
pub use worker::Worker;
