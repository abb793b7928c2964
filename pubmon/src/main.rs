use clap::{Arg, ArgAction, ArgMatches, Command};
use pubmon_core::{
    config::{CliConfig, CredentialPayload},
    CancellationToken, Config, GcloudInspector, MetricEmitter, MetricsCollector,
};
use std::{io::stdout, path::PathBuf, process};
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let cli_config = cli_config(&matches);
    let json_config_path = matches.get_one::<PathBuf>("json-config");
    let config = Config::load(Some(&cli_config), json_config_path)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal");
        handler_token.cancel();
    }) {
        warn!("Failed to set interrupt handler: {}", e);
    }

    let inspector = GcloudInspector::from_config(&config);
    let mut emitter = MetricEmitter::new(config.metric_prefix.clone(), stdout().lock());
    let outcome = MetricsCollector::new(&config, &inspector, cancel).run(&mut emitter)?;

    info!(
        state = ?outcome.state,
        errors = outcome.error_count,
        elapsed_secs = outcome.elapsed_seconds,
        lines = emitter.emitted(),
        "run finished"
    );
    Ok(outcome.exit_code())
}

fn cli() -> Command {
    Command::new("pubmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Probe Google Cloud Pub/Sub and print monitoring-agent metric lines")
        .arg(
            Arg::new("project")
                .long("project")
                .value_name("PROJECT_ID")
                .env("GCP_PROJECT_ID")
                .help("Google Cloud project to probe"),
        )
        .arg(
            Arg::new("topics")
                .long("topics")
                .value_name("LIST")
                .env("PUBSUB_TOPICS")
                .help("Comma-separated topic names"),
        )
        .arg(
            Arg::new("subscriptions")
                .long("subscriptions")
                .value_name("LIST")
                .env("PUBSUB_SUBSCRIPTIONS")
                .help("Comma-separated subscription names"),
        )
        .arg(
            Arg::new("credentials-file")
                .long("credentials-file")
                .value_name("PATH")
                .env("GOOGLE_APPLICATION_CREDENTIALS")
                .help("Service-account key file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("credentials-json")
                .long("credentials-json")
                .value_name("JSON")
                .env("GCP_SERVICE_ACCOUNT_KEY")
                .hide_env_values(true)
                .hide(true)
                .help("Inline service-account key, used when no key file exists"),
        )
        .arg(
            Arg::new("metric-prefix")
                .long("metric-prefix")
                .value_name("PREFIX")
                .env("METRIC_PREFIX")
                .help("Leading segments of every metric name"),
        )
        .arg(
            Arg::new("custom-log")
                .long("custom-log")
                .value_name("PATH")
                .env("PUBMON_CUSTOM_LOG")
                .help("Log file with CUSTOM_METRIC lines")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("gcloud")
                .long("gcloud")
                .value_name("PATH")
                .env("PUBMON_GCLOUD")
                .help("gcloud executable")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json-config")
                .long("json-config")
                .value_name("PATH")
                .help("Path to JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (stderr)")
                .action(ArgAction::Count),
        )
}

fn cli_config(matches: &ArgMatches) -> CliConfig {
    CliConfig {
        project_id: matches.get_one::<String>("project").cloned(),
        topics: matches.get_one::<String>("topics").cloned(),
        subscriptions: matches.get_one::<String>("subscriptions").cloned(),
        credentials_file: matches.get_one::<PathBuf>("credentials-file").cloned(),
        credentials_json: matches
            .get_one::<String>("credentials-json")
            .map(CredentialPayload::new),
        metric_prefix: matches.get_one::<String>("metric-prefix").cloned(),
        custom_log_path: matches.get_one::<PathBuf>("custom-log").cloned(),
        gcloud_path: matches.get_one::<PathBuf>("gcloud").cloned(),
    }
}

/// Logs go to stderr; stdout carries only metric lines.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_map_to_overrides() {
        let matches = cli()
            .try_get_matches_from([
                "pubmon",
                "--project",
                "acme",
                "--topics",
                "a,b",
                "--credentials-file",
                "/etc/key.json",
                "-vv",
            ])
            .unwrap();
        let overrides = cli_config(&matches);

        assert_eq!(overrides.project_id.as_deref(), Some("acme"));
        assert_eq!(overrides.topics.as_deref(), Some("a,b"));
        assert_eq!(overrides.credentials_file, Some(PathBuf::from("/etc/key.json")));
        assert_eq!(matches.get_count("verbose"), 2);
    }
}
