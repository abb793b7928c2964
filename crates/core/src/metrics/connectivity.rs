use crate::{
    emitter::MetricEmitter,
    error::Result,
    inspector::{ResourceInspector, PUBSUB_SERVICE},
    model::MetricRecord,
};
use std::io::Write;
use tracing::{error, info, warn};

pub struct ConnectivityProber<'a, I: ResourceInspector + ?Sized> {
    inspector: &'a I,
}

impl<'a, I: ResourceInspector + ?Sized> ConnectivityProber<'a, I> {
    pub fn new(inspector: &'a I) -> Self {
        Self { inspector }
    }

    /// Gate for the rest of the run: `false` means the project is unreachable.
    pub fn probe<W: Write>(&self, emitter: &mut MetricEmitter<W>) -> Result<bool> {
        let reachable = match self.inspector.describe_project() {
            Ok(()) => {
                info!("project reachable");
                true
            }
            Err(e) => {
                error!(error = %e, "project unreachable, skipping collection");
                false
            }
        };

        emitter.emit(&MetricRecord::flag(["Connectivity", "Project Access"], reachable))?;
        Ok(reachable)
    }

    /// Whether the Pub/Sub API is enabled. Informational only.
    pub fn probe_api<W: Write>(&self, emitter: &mut MetricEmitter<W>) -> Result<bool> {
        let enabled = match self.inspector.list_enabled_services() {
            Ok(services) => services.iter().any(|s| s == PUBSUB_SERVICE),
            Err(e) => {
                warn!(error = %e, "could not list enabled services");
                false
            }
        };

        emitter.emit(&MetricRecord::flag(["Connectivity", "PubSub API Enabled"], enabled))?;
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::fake::FakeInspector;

    #[test]
    fn test_reachable_project() {
        let inspector = FakeInspector::reachable();
        let mut e = MetricEmitter::new("P", Vec::new());
        assert!(ConnectivityProber::new(&inspector).probe(&mut e).unwrap());
        let out = String::from_utf8(e.into_inner()).unwrap();
        assert_eq!(out, "name=P|Connectivity|Project Access, value=1\n");
    }

    #[test]
    fn test_unreachable_project() {
        let inspector = FakeInspector::default();
        let mut e = MetricEmitter::new("P", Vec::new());
        assert!(!ConnectivityProber::new(&inspector).probe(&mut e).unwrap());
        let out = String::from_utf8(e.into_inner()).unwrap();
        assert_eq!(out, "name=P|Connectivity|Project Access, value=0\n");
    }

    #[test]
    fn test_api_disabled() {
        let inspector = FakeInspector {
            services: vec!["storage.googleapis.com".to_string()],
            ..FakeInspector::reachable()
        };
        let mut e = MetricEmitter::new("P", Vec::new());
        assert!(!ConnectivityProber::new(&inspector).probe_api(&mut e).unwrap());
    }
}
