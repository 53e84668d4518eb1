//! Plain-text rendering of command results.

use chrono::Local;

use crate::config::Config;
use crate::ingest::IngestReport;
use crate::lookup::LookupResponse;
use crate::store::StoreStats;

/// Wall-clock stamp used to prefix terminal results.
#[must_use]
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Format an integer with `,` thousands separators.
#[must_use]
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Join rendered lines, each terminated by a newline.
fn lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Render a lookup response, optionally stamped with `[HH:MM:SS]`.
#[must_use]
pub fn lookup(response: &LookupResponse, stamp: Option<&str>) -> String {
    let mut out = vec![match stamp {
        Some(stamp) => format!("[{stamp}] {}", response.user_id),
        None => response.user_id.clone(),
    }];

    if response.found {
        out.push("  status:  FOUND".to_string());
        out.push(format!("  email:   {}", response.email.as_deref().unwrap_or("")));
        out.push(format!("  ip:      {}", response.ip.as_deref().unwrap_or("")));
        if let Some(encoded) = response.encoded.as_deref().filter(|e| !e.is_empty()) {
            out.push(format!("  encoded: {encoded}"));
        }
    } else {
        out.push(format!(
            "  status:  NOT FOUND ({})",
            response.message.as_deref().unwrap_or("")
        ));
        if !response.similar.is_empty() {
            out.push(format!("  similar: {}", response.similar.join(", ")));
        }
    }
    lines(out)
}

/// Render an ingestion report as a per-source table plus totals.
#[must_use]
pub fn report(report: &IngestReport) -> String {
    let width = report
        .sources
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("Source".len());

    let mut out = vec![format!(
        "{:<width$}  {:>10}  {:>10}  {:>9}",
        "Source", "Lines", "Loaded", "Rejected"
    )];
    out.extend(report.sources.iter().map(|source| match &source.error {
        Some(error) => format!("{:<width$}  error: {error}", source.name),
        None => format!(
            "{:<width$}  {:>10}  {:>10}  {:>9}",
            source.name,
            group_thousands(source.lines),
            group_thousands(source.loaded),
            group_thousands(source.rejected),
        ),
    }));
    out.push(String::new());
    out.push(format!(
        "Total loaded: {} users ({} records parsed) from {}/{} sources in {} ms",
        group_thousands(report.unique_users),
        group_thousands(report.records_parsed),
        report.sources_ok(),
        report.sources.len(),
        report.elapsed_ms,
    ));
    lines(out)
}

/// Render snapshot statistics.
#[must_use]
pub fn stats(stats: &StoreStats) -> String {
    let loaded_at = stats.loaded_at.with_timezone(&Local);
    lines(vec![
        format!("Unique users:    {}", group_thousands(stats.unique_users)),
        format!("Records parsed:  {}", group_thousands(stats.records_parsed)),
        format!("With email:      {}", group_thousands(stats.with_email)),
        format!("With IP:         {}", group_thousands(stats.with_ip)),
        format!("Loaded at:       {}", loaded_at.format("%Y-%m-%d %H:%M:%S")),
    ])
}

/// Render a list of sample IDs, one per line.
#[must_use]
pub fn sample(ids: &[String]) -> String {
    if ids.is_empty() {
        return "(no records loaded)\n".to_string();
    }
    lines(ids.to_vec())
}

/// Render the effective configuration.
#[must_use]
pub fn config(config: &Config) -> String {
    let display_paths = |paths: &[std::path::PathBuf]| {
        if paths.is_empty() {
            "(none)".to_string()
        } else {
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let interval = config
        .refresh_interval()
        .map_or_else(|| "disabled".to_string(), |i| i.as_secs().to_string());

    lines(vec![
        "Current Configuration".to_string(),
        "=====================".to_string(),
        String::new(),
        "[Data]".to_string(),
        format!("  Files:            {}", display_paths(&config.data.files)),
        format!("  Search dirs:      {}", display_paths(&config.data.search_dirs)),
        format!("  Part prefix:      {}", config.data.part_prefix),
        format!("  Part count:       {}", config.data.part_count),
        format!("  Fallback pattern: {}", config.data.fallback_pattern),
        String::new(),
        "[Lookup]".to_string(),
        format!("  Similar limit:    {}", config.lookup.similar_limit),
        format!("  Prefix length:    {}", config.lookup.prefix_len),
        format!("  Sample size:      {}", config.lookup.sample_size),
        String::new(),
        "[Refresh]".to_string(),
        format!("  Interval (secs):  {interval}"),
    ])
}
