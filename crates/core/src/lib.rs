pub mod auth;
pub mod cancel;
pub mod config;
pub mod emitter;
pub mod error;
pub mod inspector;
pub mod metrics;
pub mod model;

pub use cancel::CancellationToken;
pub use config::Config;
pub use emitter::MetricEmitter;
pub use error::{CoreError, Result};
pub use inspector::{GcloudInspector, ResourceInspector};
pub use metrics::MetricsCollector;
pub use model::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.project_id, config::PLACEHOLDER_PROJECT_ID);
        assert_eq!(config.metric_prefix, "Custom Metrics|PubSub");
        assert_eq!(config.metadata_timeout_ms, 2000);
        assert!(config.credentials_file.is_none());
    }

    #[test]
    fn test_resource_name_parsing() {
        assert_eq!(ResourceName::parse("  orders "), ResourceName::parse("orders"));
        assert!(ResourceName::parse("   ").is_none());
        assert_eq!(ResourceName::parse_list("t1,,t2").len(), 2);
        assert!(ResourceName::parse_list("").is_empty());
    }

    #[test]
    fn test_tally_accessible_never_exceeds_total() {
        let mut tally = ResourceTally::default();
        for accessible in [true, false, true, false, false] {
            tally.record(accessible);
            assert!(tally.accessible <= tally.total);
        }
        assert_eq!(tally.success_rate(), Some(40));
        assert_eq!(ResourceTally::default().success_rate(), None);
    }

    #[test]
    fn test_outcome_exit_codes() {
        let ok = CollectionOutcome {
            error_count: 0,
            elapsed_seconds: 3,
            success: true,
            state: CollectionState::Summarized,
        };
        assert_eq!(ok.exit_code(), 0);

        let aborted = CollectionOutcome {
            state: CollectionState::Aborted,
            ..ok.clone()
        };
        assert_eq!(aborted.exit_code(), 1);
        assert!(CollectionState::Interrupted.is_terminal());
        assert!(!CollectionState::Collecting.is_terminal());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CollectionOutcome {
            error_count: 2,
            elapsed_seconds: 11,
            success: false,
            state: CollectionState::Summarized,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: CollectionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
