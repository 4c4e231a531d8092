use crate::config::TurnTakingConfig;
use std::collections::HashMap;
use std::time::Duration;

/// Silence timing for one workflow type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    /// Caller silence before a single "are you still there?" prompt
    pub silence: Duration,

    /// Caller silence before the timeout message; the silence clock then restarts
    pub timeout: Duration,

    /// Window after the assistant stops speaking during which silence is not monitored
    pub grace: Duration,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            silence: Duration::from_millis(8_000),
            timeout: Duration::from_millis(20_000),
            grace: Duration::from_millis(1_500),
        }
    }
}

/// Global defaults plus per-workflow overrides
#[derive(Debug, Clone, Default)]
pub struct TimingProfiles {
    defaults: TimingProfile,
    by_workflow: HashMap<String, TimingProfile>,
}

impl TimingProfiles {
    pub fn new(defaults: TimingProfile) -> Self {
        Self {
            defaults,
            by_workflow: HashMap::new(),
        }
    }

    pub fn with_profile(mut self, workflow_type: impl Into<String>, profile: TimingProfile) -> Self {
        self.by_workflow.insert(workflow_type.into(), profile);
        self
    }

    pub fn from_config(config: &TurnTakingConfig) -> Self {
        let defaults = TimingProfile {
            silence: Duration::from_millis(config.silence_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            grace: Duration::from_millis(config.grace_ms),
        };

        let by_workflow = config
            .profiles
            .iter()
            .map(|(name, o)| {
                let profile = TimingProfile {
                    silence: o.silence_ms.map(Duration::from_millis).unwrap_or(defaults.silence),
                    timeout: o.timeout_ms.map(Duration::from_millis).unwrap_or(defaults.timeout),
                    grace: o.grace_ms.map(Duration::from_millis).unwrap_or(defaults.grace),
                };
                (name.clone(), profile)
            })
            .collect();

        Self {
            defaults,
            by_workflow,
        }
    }

    /// Profile for `workflow_type`, or the global defaults
    pub fn resolve(&self, workflow_type: Option<&str>) -> TimingProfile {
        workflow_type
            .and_then(|w| self.by_workflow.get(w))
            .copied()
            .unwrap_or(self.defaults)
    }
}
