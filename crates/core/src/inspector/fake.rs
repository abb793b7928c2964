//! In-memory inspector for collector tests.

use super::{ResourceInspector, SubscriptionDetails, PUBSUB_SERVICE};
use crate::{
    error::{CoreError, Result},
    model::ResourceName,
    CancellationToken,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
};

#[derive(Default)]
pub struct FakeInspector {
    pub reachable: bool,
    pub activation_fails: bool,
    /// topic name -> attached subscriptions
    pub topics: HashMap<String, Vec<String>>,
    pub subscriptions: HashMap<String, SubscriptionDetails>,
    pub services: Vec<String>,
    /// Set this token when the project is described
    pub cancel_on_project: Option<CancellationToken>,
    /// Set this token when the named topic is described
    pub cancel_on_topic: Option<(String, CancellationToken)>,
    pub calls: RefCell<Vec<String>>,
    pub activated_with: RefCell<Option<PathBuf>>,
}

impl FakeInspector {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            services: vec![PUBSUB_SERVICE.to_string()],
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, name: &str, subscriptions: usize) -> Self {
        let subs = (0..subscriptions)
            .map(|i| format!("projects/acme/subscriptions/{}-{}", name, i))
            .collect();
        self.topics.insert(name.to_string(), subs);
        self
    }

    pub fn with_subscription(mut self, name: &str, ack_deadline: Option<u64>) -> Self {
        self.subscriptions.insert(
            name.to_string(),
            SubscriptionDetails {
                ack_deadline_seconds: ack_deadline,
            },
        );
        self
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn not_found(what: &str) -> CoreError {
        CoreError::CommandFailed {
            command: format!("gcloud {}", what),
            status: "exit status: 1".to_string(),
            stderr: "NOT_FOUND".to_string(),
        }
    }
}

impl ResourceInspector for FakeInspector {
    fn activate_service_account(&self, key_file: &Path) -> Result<()> {
        self.record("activate".to_string());
        *self.activated_with.borrow_mut() = Some(key_file.to_path_buf());
        if self.activation_fails {
            return Err(CoreError::credentials("invalid key"));
        }
        Ok(())
    }

    fn describe_project(&self) -> Result<()> {
        self.record("project".to_string());
        if let Some(token) = &self.cancel_on_project {
            token.cancel();
        }
        if self.reachable {
            Ok(())
        } else {
            Err(Self::not_found("projects describe"))
        }
    }

    fn describe_topic(&self, topic: &ResourceName) -> Result<()> {
        self.record(format!("topic:{}", topic));
        if let Some((name, token)) = &self.cancel_on_topic {
            if name == topic.as_str() {
                token.cancel();
            }
        }
        if self.topics.contains_key(topic.as_str()) {
            Ok(())
        } else {
            Err(Self::not_found("pubsub topics describe"))
        }
    }

    fn list_topic_subscriptions(&self, topic: &ResourceName) -> Result<Vec<String>> {
        self.record(format!("topic-subs:{}", topic));
        self.topics
            .get(topic.as_str())
            .cloned()
            .ok_or_else(|| Self::not_found("pubsub topics list-subscriptions"))
    }

    fn describe_subscription(&self, subscription: &ResourceName) -> Result<SubscriptionDetails> {
        self.record(format!("subscription:{}", subscription));
        self.subscriptions
            .get(subscription.as_str())
            .cloned()
            .ok_or_else(|| Self::not_found("pubsub subscriptions describe"))
    }

    fn list_enabled_services(&self) -> Result<Vec<String>> {
        self.record("services".to_string());
        Ok(self.services.clone())
    }
}
