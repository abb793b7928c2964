use crate::{
    cancel::CancellationToken,
    emitter::MetricEmitter,
    error::Result,
    inspector::ResourceInspector,
    model::{MetricRecord, ResourceKind, ResourceName, ResourceProbeResult, ResourceTally},
};
use std::{collections::BTreeMap, io::Write};
use tracing::{debug, info, warn};

pub const ATTR_SUBSCRIPTIONS: &str = "Subscriptions";
pub const ATTR_ACK_DEADLINE: &str = "Ack Deadline";

/// Probes every configured topic or subscription once, independently
pub struct ResourceEnumerator<'a, I: ResourceInspector + ?Sized> {
    inspector: &'a I,
}

impl<'a, I: ResourceInspector + ?Sized> ResourceEnumerator<'a, I> {
    pub fn new(inspector: &'a I) -> Self {
        Self { inspector }
    }

    /// Probe a whole list and emit per-resource metrics followed by totals.
    ///
    /// Returns `None` if the token was cancelled mid-list; totals for a
    /// partial list are not emitted.
    pub fn collect<W: Write>(
        &self,
        kind: ResourceKind,
        names: &[ResourceName],
        emitter: &mut MetricEmitter<W>,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceTally>> {
        let mut tally = ResourceTally::default();

        for name in names {
            if cancel.is_cancelled() {
                debug!(kind = kind.plural(), "enumeration cancelled");
                return Ok(None);
            }

            let result = self.probe(kind, name);
            tally.record(result.accessible);
            emit_probe(kind, &result, emitter)?;
        }

        emitter.emit(&MetricRecord::new(
            [kind.plural(), "Total Configured"],
            tally.total as f64,
        ))?;
        emitter.emit(&MetricRecord::new(
            [kind.plural(), "Accessible"],
            tally.accessible as f64,
        ))?;
        if let Some(rate) = tally.success_rate() {
            emitter.emit(&MetricRecord::new([kind.plural(), "Success Rate"], rate as f64))?;
        }

        info!(
            kind = kind.plural(),
            total = tally.total,
            accessible = tally.accessible,
            "enumeration finished"
        );
        Ok(Some(tally))
    }

    pub fn probe(&self, kind: ResourceKind, name: &ResourceName) -> ResourceProbeResult {
        match kind {
            ResourceKind::Topic => self.probe_topic(name),
            ResourceKind::Subscription => self.probe_subscription(name),
        }
    }

    pub fn probe_topic(&self, name: &ResourceName) -> ResourceProbeResult {
        let mut extra = BTreeMap::new();

        let accessible = match self.inspector.describe_topic(name) {
            Ok(()) => {
                match self.inspector.list_topic_subscriptions(name) {
                    Ok(subs) => {
                        extra.insert(ATTR_SUBSCRIPTIONS.to_string(), subs.len() as f64);
                    }
                    Err(e) => warn!(topic = %name, error = %e, "could not list topic subscriptions"),
                }
                true
            }
            Err(e) => {
                warn!(topic = %name, error = %e, "topic not accessible");
                false
            }
        };

        ResourceProbeResult {
            name: name.clone(),
            accessible,
            extra,
        }
    }

    pub fn probe_subscription(&self, name: &ResourceName) -> ResourceProbeResult {
        let mut extra = BTreeMap::new();

        let accessible = match self.inspector.describe_subscription(name) {
            Ok(details) => {
                match details.ack_deadline_seconds {
                    Some(secs) => {
                        extra.insert(ATTR_ACK_DEADLINE.to_string(), secs as f64);
                    }
                    None => debug!(subscription = %name, "no ack deadline in describe output"),
                }
                true
            }
            Err(e) => {
                warn!(subscription = %name, error = %e, "subscription not accessible");
                false
            }
        };

        ResourceProbeResult {
            name: name.clone(),
            accessible,
            extra,
        }
    }
}

fn emit_probe<W: Write>(
    kind: ResourceKind,
    result: &ResourceProbeResult,
    emitter: &mut MetricEmitter<W>,
) -> Result<()> {
    let name = result.name.as_str();
    emitter.emit(&MetricRecord::flag(
        [kind.singular(), name, "Status"],
        result.accessible,
    ))?;

    for (attr, value) in &result.extra {
        let mut record = MetricRecord::new([kind.singular(), name, attr.as_str()], *value);
        if attr == ATTR_ACK_DEADLINE {
            record = record.with_unit("seconds");
        }
        emitter.emit(&record)?;
    }
    Ok(())
}
