pub mod connectivity;
pub mod custom;
pub mod resources;
pub mod system;

pub use connectivity::ConnectivityProber;
pub use custom::CustomMetricCollector;
pub use resources::ResourceEnumerator;
pub use system::SystemCollector;

use crate::{
    auth::{Authenticator, CredentialGuard},
    cancel::CancellationToken,
    config::Config,
    emitter::MetricEmitter,
    error::Result,
    inspector::ResourceInspector,
    model::{CollectionOutcome, CollectionState, MetricRecord, ResourceKind},
};
use std::{io::Write, time::Instant};
use tracing::{debug, error, info, warn};

/// Main metrics collector that sequences authentication, the connectivity
/// gate and all sub-collectors for a single pass
pub struct MetricsCollector<'a, I: ResourceInspector + ?Sized> {
    config: &'a Config,
    inspector: &'a I,
    cancel: CancellationToken,
    state: CollectionState,
    errors: u32,
}

impl<'a, I: ResourceInspector + ?Sized> MetricsCollector<'a, I> {
    pub fn new(config: &'a Config, inspector: &'a I, cancel: CancellationToken) -> Self {
        Self {
            config,
            inspector,
            cancel,
            state: CollectionState::Init,
            errors: 0,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Run one complete pass. The temporary credential file, if any, is
    /// removed before this returns, on every path.
    pub fn run<W: Write>(&mut self, emitter: &mut MetricEmitter<W>) -> Result<CollectionOutcome> {
        let started = Instant::now();
        self.state = CollectionState::Init;
        self.errors = 0;

        if let Err(e) = self.config.validate() {
            error!(error = %e, "invalid configuration");
            self.errors += 1;
            emitter.emit(&MetricRecord::new(["Setup Error", "Invalid Configuration"], 1.0))?;
            self.transition(CollectionState::Aborted);
            return Ok(self.outcome(started));
        }
        self.transition(CollectionState::ConfigValidated);

        let mut guard = CredentialGuard::default();
        let outcome = self.run_validated(emitter, &mut guard, started);
        guard.cleanup();
        debug_assert!(outcome.is_err() || self.state.is_terminal());
        outcome
    }

    fn run_validated<W: Write>(
        &mut self,
        emitter: &mut MetricEmitter<W>,
        guard: &mut CredentialGuard,
        started: Instant,
    ) -> Result<CollectionOutcome> {
        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }

        let auth = Authenticator::new(self.config, self.inspector).activate(emitter, guard)?;
        if !auth.is_authenticated() {
            self.errors += 1;
        }
        self.transition(CollectionState::Authenticated);

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }

        let prober = ConnectivityProber::new(self.inspector);
        if !prober.probe(emitter)? {
            // A signal also kills the gcloud child, which looks like an
            // unreachable project
            if self.cancel.is_cancelled() {
                return self.interrupt(emitter, guard, started);
            }
            self.errors += 1;
            self.transition(CollectionState::Aborted);
            self.summarize(emitter, started)?;
            if self.cancel.is_cancelled() {
                return self.interrupt(emitter, guard, started);
            }
            return Ok(self.outcome(started));
        }
        self.transition(CollectionState::Connected);
        prober.probe_api(emitter)?;

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }
        self.transition(CollectionState::Collecting);

        let enumerator = ResourceEnumerator::new(self.inspector);
        let lists = [
            (ResourceKind::Topic, self.config.topic_names()),
            (ResourceKind::Subscription, self.config.subscription_names()),
        ];
        for (kind, names) in &lists {
            if enumerator.collect(*kind, names, emitter, &self.cancel)?.is_none() {
                return self.interrupt(emitter, guard, started);
            }
        }

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }
        CustomMetricCollector::new(&self.config.custom_log_path).collect(emitter)?;

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }
        SystemCollector::new(self.config).collect(emitter)?;

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }
        self.summarize(emitter, started)?;
        self.transition(CollectionState::Summarized);

        if self.cancel.is_cancelled() {
            return self.interrupt(emitter, guard, started);
        }
        Ok(self.outcome(started))
    }

    fn summarize<W: Write>(&self, emitter: &mut MetricEmitter<W>, started: Instant) -> Result<()> {
        let elapsed = started.elapsed().as_secs();
        emitter.emit(&MetricRecord::new(["Collection", "Errors"], self.errors as f64))?;
        emitter.emit(&MetricRecord::new(["Collection", "Duration"], elapsed as f64).with_unit("seconds"))?;
        emitter.emit(&MetricRecord::flag(["Collection", "Success"], self.errors == 0))?;

        info!(errors = self.errors, elapsed_secs = elapsed, "collection summarized");
        Ok(())
    }

    /// Cleanup first, then the interrupt marker as the final line
    fn interrupt<W: Write>(
        &mut self,
        emitter: &mut MetricEmitter<W>,
        guard: &mut CredentialGuard,
        started: Instant,
    ) -> Result<CollectionOutcome> {
        warn!(state = ?self.state, "collection interrupted");
        guard.cleanup();
        self.transition(CollectionState::Interrupted);
        emitter.emit(&MetricRecord::new(["Collection", "Interrupted"], 1.0))?;
        Ok(self.outcome(started))
    }

    fn transition(&mut self, next: CollectionState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    fn outcome(&self, started: Instant) -> CollectionOutcome {
        CollectionOutcome {
            error_count: self.errors,
            elapsed_seconds: started.elapsed().as_secs(),
            success: self.errors == 0 && self.state != CollectionState::Interrupted,
            state: self.state,
        }
    }
}
