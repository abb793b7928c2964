use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single metric as reported to the monitoring agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Hierarchical name below the configured prefix
    pub path: Vec<String>,
    pub value: f64,
    pub unit: Option<String>,
}

impl MetricRecord {
    pub fn new<I, S>(path: I, value: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            value,
            unit: None,
        }
    }

    /// Boolean metrics are reported as 0/1
    pub fn flag<I, S>(path: I, set: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(path, if set { 1.0 } else { 0.0 })
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A trimmed, non-empty topic or subscription name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName(String);

impl ResourceName {
    /// Returns `None` for names that are blank after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Split a comma-separated list, dropping blank entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::parse).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two configured resource lists a probe belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Topic,
    Subscription,
}

impl ResourceKind {
    /// Segment used for the per-resource metrics
    pub fn singular(self) -> &'static str {
        match self {
            Self::Topic => "Topic",
            Self::Subscription => "Subscription",
        }
    }

    /// Segment used for the per-list totals
    pub fn plural(self) -> &'static str {
        match self {
            Self::Topic => "Topics",
            Self::Subscription => "Subscriptions",
        }
    }
}

/// Outcome of probing one topic or subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProbeResult {
    pub name: ResourceName,
    pub accessible: bool,
    /// Attribute metrics keyed by their final path segment
    pub extra: BTreeMap<String, f64>,
}

/// Per-list totals after an enumeration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTally {
    pub total: u32,
    pub accessible: u32,
}

impl ResourceTally {
    pub fn record(&mut self, accessible: bool) {
        self.total += 1;
        if accessible {
            self.accessible += 1;
        }
    }

    /// Integer success percentage, `None` for an empty list.
    pub fn success_rate(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        Some(self.accessible * 100 / self.total)
    }
}

/// One `[<timestamp>] CUSTOM_METRIC <key> <value>` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricLogEntry {
    pub timestamp: String,
    pub key: String,
    pub value: f64,
}

/// Pipeline state, advanced by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionState {
    Init,
    ConfigValidated,
    Authenticated,
    Connected,
    Collecting,
    Summarized,
    Aborted,
    Interrupted,
}

impl CollectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Summarized | Self::Aborted | Self::Interrupted)
    }
}

/// Result of one complete run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub error_count: u32,
    pub elapsed_seconds: u64,
    pub success: bool,
    pub state: CollectionState,
}

impl CollectionOutcome {
    pub fn exit_code(&self) -> i32 {
        if self.state == CollectionState::Summarized && self.success {
            0
        } else {
            1
        }
    }
}
