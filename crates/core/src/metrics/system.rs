use crate::{config::Config, emitter::MetricEmitter, error::Result, model::MetricRecord};
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use sysinfo::Disks;
use tracing::{debug, warn};

const SEGMENT: &str = "System";

/// Host facts that accompany every successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSample {
    pub disk_available_kb: Option<u64>,
    pub on_gce: bool,
    pub timestamp: u64,
}

pub struct SystemCollector {
    disks: Disks,
    disk_path: PathBuf,
    metadata_url: String,
    metadata_timeout: Duration,
}

impl SystemCollector {
    pub fn new(config: &Config) -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            disk_path: config.disk_path.clone(),
            metadata_url: config.metadata_url.clone(),
            metadata_timeout: config.metadata_timeout(),
        }
    }

    /// Sample and emit. None of the samples can fail the run.
    pub fn collect<W: Write>(&mut self, emitter: &mut MetricEmitter<W>) -> Result<SystemSample> {
        let sample = self.sample();

        match sample.disk_available_kb {
            Some(kb) => emitter.emit(
                &MetricRecord::new([SEGMENT, "Disk Space Available"], kb as f64).with_unit("KB"),
            )?,
            None => warn!(path = %self.disk_path.display(), "no filesystem found for disk path"),
        }
        emitter.emit(&MetricRecord::flag([SEGMENT, "Running On GCE"], sample.on_gce))?;
        emitter.emit(&MetricRecord::new([SEGMENT, "Timestamp"], sample.timestamp as f64))?;

        Ok(sample)
    }

    pub fn sample(&mut self) -> SystemSample {
        SystemSample {
            disk_available_kb: self.disk_available_kb(),
            on_gce: detect_gce(&self.metadata_url, self.metadata_timeout),
            timestamp: unix_timestamp(),
        }
    }

    fn disk_available_kb(&mut self) -> Option<u64> {
        self.disks.refresh();

        let target = self
            .disk_path
            .canonicalize()
            .unwrap_or_else(|_| self.disk_path.clone());

        self.disks
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| mount_depth(disk.mount_point()))
            .map(|disk| disk.available_space() / 1024)
    }
}

fn mount_depth(mount_point: &Path) -> usize {
    mount_point.components().count()
}

/// The metadata server only answers inside Google Compute Engine and tags
/// its responses with `Metadata-Flavor: Google`.
pub fn detect_gce(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .no_proxy()
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "metadata client unavailable");
            return false;
        }
    };

    match client.get(url).header("Metadata-Flavor", "Google").send() {
        Ok(resp) => {
            let flavored = resp
                .headers()
                .get("Metadata-Flavor")
                .is_some_and(|v| v.as_bytes() == b"Google");
            resp.status().is_success() && flavored
        }
        Err(e) => {
            debug!(error = %e, "metadata server not reachable");
            false
        }
    }
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
