//! Evaluation configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Whether independent sibling expressions may run concurrently
    pub allow_parallel: bool,

    /// Dump every parallel sequence's strands at debug level
    pub trace_strands: bool,

    /// Record observed node timings in the run's cost cache
    pub track_costs: bool,

    /// Echo `@print` output to stdout in addition to capturing it
    pub echo_output: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            allow_parallel: true,
            trace_strands: false,
            track_costs: true,
            echo_output: false,
        }
    }
}

impl EvalConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables, falling back to the
    /// defaults for anything unset or unparsable:
    /// - `COA_PARALLEL`: allow parallel evaluation
    /// - `COA_TRACE_STRANDS`: dump strands at debug level
    /// - `COA_TRACK_COSTS`: record node timings
    /// - `COA_ECHO_OUTPUT`: echo program output to stdout
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| lookup(key).and_then(|v| parse_flag(&v)).unwrap_or(default);

        Self {
            allow_parallel: flag("COA_PARALLEL", defaults.allow_parallel),
            trace_strands: flag("COA_TRACE_STRANDS", defaults.trace_strands),
            track_costs: flag("COA_TRACK_COSTS", defaults.track_costs),
            echo_output: flag("COA_ECHO_OUTPUT", defaults.echo_output),
        }
    }

    /// Enable or disable parallel evaluation.
    pub fn with_parallel(mut self, allow: bool) -> Self {
        self.allow_parallel = allow;
        self
    }

    /// Enable or disable strand dumps.
    pub fn with_trace_strands(mut self, trace: bool) -> Self {
        self.trace_strands = trace;
        self
    }

    /// Enable or disable cost tracking.
    pub fn with_track_costs(mut self, track: bool) -> Self {
        self.track_costs = track;
        self
    }

    /// Enable or disable echoing output.
    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
