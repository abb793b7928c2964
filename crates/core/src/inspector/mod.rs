pub mod gcloud;

#[cfg(test)]
pub mod fake;

pub use gcloud::GcloudInspector;

use crate::{error::Result, model::ResourceName};
use std::path::Path;

/// Service name reported by the enabled-services listing for Pub/Sub
pub const PUBSUB_SERVICE: &str = "pubsub.googleapis.com";

/// Read-only view of the messaging service, scoped to one project
pub trait ResourceInspector {
    /// Make the given service-account key the active credential
    fn activate_service_account(&self, key_file: &Path) -> Result<()>;

    /// Succeeds when the project is reachable with the active credential
    fn describe_project(&self) -> Result<()>;

    fn describe_topic(&self, topic: &ResourceName) -> Result<()>;

    /// Full names of the subscriptions attached to a topic
    fn list_topic_subscriptions(&self, topic: &ResourceName) -> Result<Vec<String>>;

    fn describe_subscription(&self, subscription: &ResourceName) -> Result<SubscriptionDetails>;

    /// Names of the APIs enabled on the project, e.g. `pubsub.googleapis.com`
    fn list_enabled_services(&self) -> Result<Vec<String>>;
}

/// Attributes read from a successful subscription describe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDetails {
    /// Absent when the describe output carried no parseable deadline
    pub ack_deadline_seconds: Option<u64>,
}
