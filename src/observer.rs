//! Evaluation observer
//!
//! Hook invoked at well-defined points of evaluation and resolution.
//! The default implementation does nothing; [`TracingObserver`] forwards
//! every event to `tracing`.

use schema_types::Condition;
use std::fmt;

/// Why a schema reference was left unexpanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The store has no schema under the widget key
    Missing,
    /// The widget key is already on the active resolution path
    Cyclic,
    /// The reference chain exceeded `ResolverConfig::max_depth`
    DepthExceeded,
    /// The store failed to answer
    StoreError,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Missing => "missing",
            Self::Cyclic => "cyclic",
            Self::DepthExceeded => "depth exceeded",
            Self::StoreError => "store error",
        };
        f.write_str(s)
    }
}

pub trait EvalObserver: Send + Sync {
    /// An expression inside `${...}` (or a condition/style operand) was resolved
    fn expression_resolved(&self, _expr: &str, _result: &str) {}

    fn condition_evaluated(&self, _condition: &Condition, _result: bool) {}

    fn reference_skipped(&self, _widget_key: &str, _reason: SkipReason) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EvalObserver for NoopObserver {}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EvalObserver for TracingObserver {
    fn expression_resolved(&self, expr: &str, result: &str) {
        tracing::trace!(expr, result, "expression resolved");
    }

    fn condition_evaluated(&self, condition: &Condition, result: bool) {
        tracing::trace!(condition = %condition, result, "condition evaluated");
    }

    fn reference_skipped(&self, widget_key: &str, reason: SkipReason) {
        tracing::debug!(widget_key, reason = %reason, "schema reference skipped");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every event, for assertions in tests.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub expressions: Mutex<Vec<(String, String)>>,
        pub conditions: Mutex<Vec<(String, bool)>>,
        pub skipped: Mutex<Vec<(String, SkipReason)>>,
    }

    impl EvalObserver for RecordingObserver {
        fn expression_resolved(&self, expr: &str, result: &str) {
            self.expressions
                .lock()
                .unwrap()
                .push((expr.to_string(), result.to_string()));
        }

        fn condition_evaluated(&self, condition: &Condition, result: bool) {
            self.conditions
                .lock()
                .unwrap()
                .push((condition.key.clone(), result));
        }

        fn reference_skipped(&self, widget_key: &str, reason: SkipReason) {
            self.skipped
                .lock()
                .unwrap()
                .push((widget_key.to_string(), reason));
        }
    }
}
