use super::{ResourceInspector, SubscriptionDetails};
use crate::{
    config::Config,
    error::{CoreError, Result},
    model::ResourceName,
};
use serde_json::Value;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, trace};

/// `ResourceInspector` backed by the `gcloud` command-line tool
pub struct GcloudInspector {
    program: PathBuf,
    project_id: String,
}

impl GcloudInspector {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(program: P, project_id: S) -> Self {
        Self {
            program: program.into(),
            project_id: project_id.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gcloud_path.clone(), config.project_id.trim())
    }

    /// Run a project-scoped command and return its stdout
    fn query(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<OsString> = args.iter().map(OsString::from).collect();
        full.push(format!("--project={}", self.project_id).into());
        full.push("--format=json".into());
        full.push("--quiet".into());
        self.run(&full)
    }

    fn run(&self, args: &[OsString]) -> Result<String> {
        let command = self.describe_command(args);
        debug!(%command, "invoking collaborator");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| CoreError::CommandSpawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CoreError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(bytes = stdout.len(), "collaborator output");
        Ok(stdout)
    }

    fn describe_command(&self, args: &[OsString]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(args.iter().take(3).map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

impl ResourceInspector for GcloudInspector {
    fn activate_service_account(&self, key_file: &Path) -> Result<()> {
        let mut key_arg = OsString::from("--key-file=");
        key_arg.push(key_file.as_os_str());
        let args = [
            OsString::from("auth"),
            OsString::from("activate-service-account"),
            key_arg,
            OsString::from("--quiet"),
        ];
        self.run(&args).map(|_| ())
    }

    fn describe_project(&self) -> Result<()> {
        let mut full: Vec<OsString> = ["projects", "describe"].iter().map(OsString::from).collect();
        full.push(self.project_id.clone().into());
        full.push("--format=json".into());
        full.push("--quiet".into());
        self.run(&full).map(|_| ())
    }

    fn describe_topic(&self, topic: &ResourceName) -> Result<()> {
        self.query(&["pubsub", "topics", "describe", topic.as_str()])
            .map(|_| ())
    }

    fn list_topic_subscriptions(&self, topic: &ResourceName) -> Result<Vec<String>> {
        let out = self.query(&["pubsub", "topics", "list-subscriptions", topic.as_str()])?;
        parse_subscription_list(&out)
    }

    fn describe_subscription(&self, subscription: &ResourceName) -> Result<SubscriptionDetails> {
        let out = self.query(&["pubsub", "subscriptions", "describe", subscription.as_str()])?;
        Ok(parse_subscription_details(&out))
    }

    fn list_enabled_services(&self) -> Result<Vec<String>> {
        let out = self.query(&["services", "list", "--enabled"])?;
        parse_service_names(&out)
    }
}

/// `ackDeadlineSeconds` if the output is JSON carrying it; gcloud prints it
/// as a number, the REST API as a string.
pub fn parse_subscription_details(stdout: &str) -> SubscriptionDetails {
    let ack_deadline_seconds = serde_json::from_str::<Value>(stdout)
        .ok()
        .and_then(|v| v.get("ackDeadlineSeconds").cloned())
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

    SubscriptionDetails {
        ack_deadline_seconds,
    }
}

pub fn parse_subscription_list(stdout: &str) -> Result<Vec<String>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(stdout)?;
    let items = value
        .as_array()
        .ok_or_else(|| CoreError::output("subscription listing is not a JSON array"))?;

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

/// Service names from `services list`, either `config.name` or the last
/// segment of the resource `name`
pub fn parse_service_names(stdout: &str) -> Result<Vec<String>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(stdout)?;
    let items = value
        .as_array()
        .ok_or_else(|| CoreError::output("service listing is not a JSON array"))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            item.pointer("/config/name")
                .and_then(Value::as_str)
                .or_else(|| {
                    item.get("name")
                        .and_then(Value::as_str)
                        .and_then(|n| n.rsplit('/').next())
                })
                .map(str::to_string)
        })
        .collect())
}
