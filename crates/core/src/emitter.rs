use crate::{error::Result, model::MetricRecord};
use std::io::Write;

/// Delimiter between metric path segments
pub const SEGMENT_DELIMITER: char = '|';

/// Writes metric records in the monitoring agent's line protocol:
///
/// `name=<prefix>|<segment>(|<segment>)*, value=<number>[, unit=<unit>]`
pub struct MetricEmitter<W: Write> {
    prefix: String,
    out: W,
    emitted: usize,
}

impl<W: Write> MetricEmitter<W> {
    pub fn new<S: Into<String>>(prefix: S, out: W) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches(SEGMENT_DELIMITER).to_string(),
            out,
            emitted: 0,
        }
    }

    pub fn emit(&mut self, record: &MetricRecord) -> Result<()> {
        let line = self.format(record);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        self.emitted += 1;
        Ok(())
    }

    pub fn format(&self, record: &MetricRecord) -> String {
        let mut name = self.prefix.clone();
        for segment in &record.path {
            name.push(SEGMENT_DELIMITER);
            name.push_str(&sanitize(segment));
        }

        let mut line = format!("name={}, value={}", name, format_value(record.value));
        if let Some(unit) = &record.unit {
            line.push_str(", unit=");
            line.push_str(&sanitize(unit));
        }
        line
    }

    /// Number of lines written so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Characters that would break the line grammar
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '|' | ',' | '=' | '\n' | '\r' => '_',
            other => other,
        })
        .collect()
}

fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
