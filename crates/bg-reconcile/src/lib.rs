//! Pool reconciler (§4.7, C8): the periodic loop that scales each work pool
//! toward `min_size`, retires idle and orphaned sessions, and sweeps stuck
//! rows. Decision arithmetic lives in [`report`] as plain functions over
//! already-fetched counts; [`tick`] is the only module that touches the
//! database.

pub mod error;
pub mod report;
pub mod scale;
pub mod tick;

pub use error::{ReconcileError, ReconcileResult};
pub use report::{decide_scale, PoolReconcileReport, ScaleDecision};
pub use scale::handle_pool_scale;
pub use tick::{
    handle_cleanup_expired, run_cleanup_scheduler, run_forever, run_tick_once, tick_pool,
    CLEANUP_MAX_AGE_HOURS, DEFAULT_CLEANUP_INTERVAL, DEFAULT_TICK_INTERVAL,
};
