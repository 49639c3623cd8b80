//! Timeline settings and the per-tick execution context.
//!
//! `TimelineSettings` is the validated, caller-supplied configuration for a
//! timeline. `ExecutionContext` is the immutable snapshot the driver hands a
//! flow when the flow requests it: current frame index, simulated time, and
//! a read-only view of the settings. Flows only ever read the context; the
//! driver is the sole writer of the frame counter.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{TimelineError, TimelineResult};

/// Configuration for a timeline. Validated once at timeline construction;
/// fixed for the lifetime of the timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineSettings {
    /// Frames per simulated second. Must be finite and positive.
    pub frame_rate: f64,

    /// Opaque caller-supplied options, read-only to flows. The scheduler
    /// never interprets these; host applications use them to thread
    /// project-level configuration to flow code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl TimelineSettings {
    /// Settings with the given frame rate and no extra options.
    pub fn with_frame_rate(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            options: BTreeMap::new(),
        }
    }

    /// Validate the settings. Called by `Timeline::new`; invalid settings
    /// fail timeline construction, never individual ticks.
    pub fn validate(&self) -> TimelineResult<()> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(TimelineError::InvalidArgument(format!(
                "frame rate must be finite and positive, got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }
}

/// Immutable snapshot of the timeline's state at the current tick, handed to
/// a flow exactly when it asks for it. Construction is owned by the driver.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    frame_index: u64,
    simulated_time: f64,
    settings: Rc<TimelineSettings>,
}

impl ExecutionContext {
    pub(crate) fn new(
        frame_index: u64,
        simulated_time: f64,
        settings: Rc<TimelineSettings>,
    ) -> Self {
        Self {
            frame_index,
            simulated_time,
            settings,
        }
    }

    /// The current frame index. Incremented exactly once per driver tick,
    /// never decreases.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The current simulated time in seconds (`frame_index / frame_rate`).
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// The timeline's frame rate.
    pub fn frame_rate(&self) -> f64 {
        self.settings.frame_rate
    }

    /// Read-only view of the timeline settings.
    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_settings_pass() {
        assert!(TimelineSettings::with_frame_rate(30.0).validate().is_ok());
    }

    #[test]
    fn invalid_frame_rates_fail_validation() {
        for fps in [0.0, -24.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                TimelineSettings::with_frame_rate(fps).validate(),
                Err(TimelineError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn settings_round_trip_through_serde() {
        let mut settings = TimelineSettings::with_frame_rate(24.0);
        settings
            .options
            .insert("quality".to_string(), serde_json::json!("draft"));

        let json = serde_json::to_string(&settings).unwrap();
        let back: TimelineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.frame_rate, 24.0);
        assert_eq!(back.options["quality"], serde_json::json!("draft"));
    }

    #[test]
    fn context_exposes_settings_read_only() {
        let settings = Rc::new(TimelineSettings::with_frame_rate(60.0));
        let ctx = ExecutionContext::new(120, 2.0, settings);
        assert_eq!(ctx.frame_index(), 120);
        assert_eq!(ctx.simulated_time(), 2.0);
        assert_eq!(ctx.frame_rate(), 60.0);
    }
}
