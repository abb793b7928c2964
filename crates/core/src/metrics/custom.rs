use crate::{
    emitter::MetricEmitter,
    error::Result,
    model::{CustomMetricLogEntry, MetricRecord},
};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info, warn};

const MARKER: &str = "CUSTOM_METRIC";
const SEGMENT: &str = "Custom";

/// What the custom metric log pass found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomLogSummary {
    pub file_present: bool,
    pub entries: u32,
    pub age_seconds: u64,
}

/// Surfaces metrics an external process appends to a log file
pub struct CustomMetricCollector {
    path: PathBuf,
}

impl CustomMetricCollector {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn collect<W: Write>(&self, emitter: &mut MetricEmitter<W>) -> Result<CustomLogSummary> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    debug!(path = %self.path.display(), "no custom metric log");
                } else {
                    warn!(path = %self.path.display(), error = %e, "custom metric log unreadable");
                }
                emitter.emit(&MetricRecord::flag([SEGMENT, "File Status"], false))?;
                emitter.emit(&MetricRecord::new([SEGMENT, "Entries Found"], 0.0))?;
                return Ok(CustomLogSummary::default());
            }
        };

        emitter.emit(&MetricRecord::flag([SEGMENT, "File Status"], true))?;

        let mut entries = 0u32;
        for raw in BufReader::new(file).split(b'\n') {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "stopped reading custom metric log");
                    break;
                }
            };
            let Ok(line) = String::from_utf8(raw) else {
                continue;
            };
            let Some(entry) = parse_log_line(&line) else {
                continue;
            };

            let name = display_key(&entry.key);
            emitter.emit(&MetricRecord::new([SEGMENT, name.as_str()], entry.value))?;
            entries += 1;
        }

        let age_seconds = file_age_seconds(&self.path);
        emitter.emit(&MetricRecord::new([SEGMENT, "Entries Found"], entries as f64))?;
        emitter.emit(&MetricRecord::new([SEGMENT, "File Age"], age_seconds as f64).with_unit("seconds"))?;

        info!(entries, age_seconds, "custom metric log processed");
        Ok(CustomLogSummary {
            file_present: true,
            entries,
            age_seconds,
        })
    }
}

/// Tokenize `[<timestamp>] CUSTOM_METRIC <key> <value>`; `None` for any
/// other shape.
pub fn parse_log_line(line: &str) -> Option<CustomMetricLogEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix('[')?;
    let (timestamp, rest) = rest.split_once(']')?;
    if timestamp.trim().is_empty() || !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    if tokens.next()? != MARKER {
        return None;
    }
    let key = tokens.next()?;
    let value = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }

    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let value: f64 = value.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(CustomMetricLogEntry {
        timestamp: timestamp.to_string(),
        key: key.to_string(),
        value,
    })
}

/// `queue_backlog_size` -> `Queue Backlog Size`
pub fn display_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut word_start = true;
    for c in key.chars() {
        if c == '_' || c == ' ' {
            out.push(' ');
            word_start = true;
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn file_age_seconds(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .map(|age| age.as_secs())
        .unwrap_or(0)
}
