//! Output formatting for discovery results

use anyhow::Result;
use scout_core::{DiscoveredMatch, DiscoveryResult, ProbeFailure};
use std::fmt::Write;

/// "Found no match", "Found 1 match", "Found 3 matches"
pub fn summary_line(count: usize) -> String {
    match count {
        0 => "Found no match".to_string(),
        1 => "Found 1 match".to_string(),
        n => format!("Found {} matches", n),
    }
}

fn format_match(out: &mut String, found: &DiscoveredMatch) {
    let record = &found.record;
    let _ = writeln!(out, "Found match:");
    let _ = writeln!(out, "    Type: {}", record.types);
    let _ = writeln!(out, "    Endpoint: {}", record.endpoint_addresses.join(" "));
    if let Some(reference) = &record.reference_address {
        let _ = writeln!(out, "    Reference: {}", reference);
    }
    if let Some(source) = found.source {
        let _ = writeln!(out, "    From: {}", source);
    }
    if let Some(kind) = &record.scope_match_kind {
        let _ = writeln!(out, "    Match: {}", kind);
    }
    if !record.scopes.is_empty() {
        let _ = writeln!(out, "    Scope:");
        for scope in &record.scopes {
            let _ = writeln!(out, "        {}", scope);
        }
    }
}

fn format_failure(out: &mut String, failure: &ProbeFailure) {
    let _ = writeln!(out, "Warning: {}", failure);
}

/// Human-readable listing of every match, then a summary
pub fn format_human(result: &DiscoveryResult, unique: bool) -> String {
    let mut out = String::new();

    for failure in &result.probe_failures {
        format_failure(&mut out, failure);
    }

    let matches: Vec<&DiscoveredMatch> = if unique {
        result.unique_devices()
    } else {
        result.matches.iter().collect()
    };

    for found in &matches {
        format_match(&mut out, found);
    }
    out.push_str(&summary_line(matches.len()));
    out
}

/// Pretty-printed JSON of the whole result
pub fn format_json(result: &DiscoveryResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Listing of probes that all failed
pub fn format_failures(failures: &[ProbeFailure]) -> String {
    let mut out = String::new();
    for failure in failures {
        format_failure(&mut out, failure);
    }
    out
}
