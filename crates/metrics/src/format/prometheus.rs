//! Prometheus text exposition
//!
//! Renders a snapshot as one line per counter:
//!
//! ```text
//! received{component="listener",name="udp"} 42 1500000000000
//! ```
//!
//! Labels are sorted by key so the output is deterministic. The trailing
//! timestamp is milliseconds since the Unix epoch.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Snapshot;

/// Render `snapshot` as Prometheus exposition lines
pub fn to_prometheus(snapshot: &Snapshot, now: SystemTime, labels: &[(&str, &str)]) -> Vec<u8> {
    let timestamp_ms = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    let label_str = format_labels(labels);

    let mut out = String::with_capacity(snapshot.len() * (label_str.len() + 48));
    for counter in snapshot.iter() {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{}{} {} {}",
            counter.name, label_str, counter.value, timestamp_ms
        );
    }
    out.into_bytes()
}

/// Format labels as `{k1="v1",k2="v2"}`, empty when there are none
fn format_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut sorted = labels.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("{");
    for (i, (key, value)) in sorted.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push_str("=\"");
        escape_label_value(value, &mut out);
        out.push('"');
    }
    out.push('}');
    out
}

fn escape_label_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
