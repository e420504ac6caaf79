//! An observer that reports attempt changes through `tracing`.

use stepwise_core::{AttemptView, Step, UsageObserver};
use tracing::{debug, trace};

/// Logs step changes at debug level and attempt changes at trace level.
/// Hosts without a database use it to see what would have been written.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl UsageObserver for TracingObserver {
    fn notify_attempt_modified(&self, qa: &dyn AttemptView) {
        trace!(usage = %qa.usage_id(), slot = ?qa.slot(), "attempt modified");
    }

    fn notify_step_added(&self, step: &Step, qa: &dyn AttemptView, seq: i64) {
        debug!(
            usage = %qa.usage_id(),
            seq,
            autosave = seq < 0,
            state = %step.state(),
            "step added"
        );
    }

    fn notify_step_modified(&self, step: &Step, qa: &dyn AttemptView, seq: usize) {
        debug!(usage = %qa.usage_id(), seq, state = %step.state(), "step modified");
    }

    fn notify_step_deleted(&self, step: &Step, qa: &dyn AttemptView) {
        debug!(usage = %qa.usage_id(), step_id = ?step.id(), "step deleted");
    }

    fn notify_metadata_added(&self, qa: &dyn AttemptView, name: &str) {
        trace!(usage = %qa.usage_id(), name, "metadata added");
    }

    fn notify_metadata_modified(&self, qa: &dyn AttemptView, name: &str) {
        trace!(usage = %qa.usage_id(), name, "metadata modified");
    }
}
