// src/metrics/mod.rs
//! Metrics side-channel. The server receives a sink at construction and
//! records tool calls through it; nothing here is process-global.

use std::time::Instant;

mod prom;

pub use self::prom::PrometheusMetrics;

/// Outcome label for successful dispatches and tool calls.
pub const OUTCOME_OK: &str = "ok";
/// Outcome label recorded when a timed operation is dropped before finishing.
pub const OUTCOME_CANCELLED: &str = "cancelled";

pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// One request handled by the dispatcher, labelled by method and outcome.
    fn observe_dispatch(&self, method: &str, outcome: &str, duration_secs: f64);
    /// One tool execution, labelled by tool name and outcome.
    fn observe_tool_call(&self, tool: &str, outcome: &str, duration_secs: f64);
    fn inc_parse_errors(&self);
    fn inc_notifications(&self, method: &str);
}

/// A no-op sink for tests or when metrics are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSink;

impl MetricsSink for NopSink {
    fn observe_dispatch(&self, _method: &str, _outcome: &str, _duration_secs: f64) {}
    fn observe_tool_call(&self, _tool: &str, _outcome: &str, _duration_secs: f64) {}
    fn inc_parse_errors(&self) {}
    fn inc_notifications(&self, _method: &str) {}
}

#[derive(Debug, Clone, Copy)]
enum Timed {
    Dispatch,
    ToolCall,
}

/// Records its elapsed time into the sink when dropped.
pub struct Timer<'a> {
    sink: &'a dyn MetricsSink,
    timed: Timed,
    label: &'a str,
    outcome: &'static str,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn dispatch(sink: &'a dyn MetricsSink, method: &'a str) -> Self {
        Self::start(sink, Timed::Dispatch, method)
    }

    pub fn tool_call(sink: &'a dyn MetricsSink, tool: &'a str) -> Self {
        Self::start(sink, Timed::ToolCall, tool)
    }

    fn start(sink: &'a dyn MetricsSink, timed: Timed, label: &'a str) -> Self {
        Self {
            sink,
            timed,
            label,
            outcome: OUTCOME_CANCELLED,
            start: Instant::now(),
        }
    }

    pub fn set_outcome(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        match self.timed {
            Timed::Dispatch => self.sink.observe_dispatch(self.label, self.outcome, elapsed),
            Timed::ToolCall => self.sink.observe_tool_call(self.label, self.outcome, elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Mutex<Vec<(String, String, String)>>,
    }

    impl MetricsSink for Recorder {
        fn observe_dispatch(&self, method: &str, outcome: &str, _duration_secs: f64) {
            self.events
                .lock()
                .unwrap()
                .push(("dispatch".into(), method.into(), outcome.into()));
        }

        fn observe_tool_call(&self, tool: &str, outcome: &str, _duration_secs: f64) {
            self.events
                .lock()
                .unwrap()
                .push(("tool".into(), tool.into(), outcome.into()));
        }

        fn inc_parse_errors(&self) {}

        fn inc_notifications(&self, _method: &str) {}
    }

    #[test]
    fn timer_records_on_drop() {
        let recorder = Recorder::default();
        {
            let mut timer = Timer::dispatch(&recorder, "tools/list");
            timer.set_outcome(OUTCOME_OK);
        }
        {
            let _timer = Timer::tool_call(&recorder, "strategy_guide");
        }

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ("dispatch".to_string(), "tools/list".to_string(), "ok".to_string()),
                ("tool".to_string(), "strategy_guide".to_string(), "cancelled".to_string()),
            ]
        );
    }
}
