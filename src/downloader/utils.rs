// Helper functions shared by the progress adapter and the yt-dlp extractor

use regex::Regex;

/// Placeholder shown for any value the tool has not reported yet
pub const NOT_AVAILABLE: &str = "N/A";

lazy_static::lazy_static! {
    static ref SIZE_RE: Regex =
        Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([KMGTP]?)(i?)B\s*$").unwrap();
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap();
}

/// Format a byte count using 1024-based units with one decimal place.
///
/// Missing, zero and negative values render as `"N/A"`.
pub fn fmt_bytes(bytes: Option<f64>) -> String {
    let Some(n) = bytes.filter(|n| n.is_finite() && *n > 0.0) else {
        return NOT_AVAILABLE.to_string();
    };

    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut x = n;
    for unit in units {
        if x < 1024.0 {
            return format!("{:.1} {}", x, unit);
        }
        x /= 1024.0;
    }
    format!("{:.1} PB", x)
}

/// Parse a size string printed by yt-dlp (e.g. "343.72MiB", "1.5 GB") into bytes
pub fn parse_size(text: &str) -> Option<f64> {
    let caps = SIZE_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let binary = !caps.get(3).map_or("", |m| m.as_str()).is_empty();
    let base: f64 = if binary { 1024.0 } else { 1000.0 };

    let exponent = match caps.get(2).map_or("", |m| m.as_str()) {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        _ => return None,
    };

    Some(value * base.powi(exponent))
}

/// Normalize a display string reported by the tool.
///
/// yt-dlp pads speed/ETA strings, may color them, and renders missing
/// template fields as "NA"; all of those collapse to a clean value or "N/A".
pub fn display_or_na(value: Option<&str>) -> String {
    let cleaned = value
        .map(|v| ANSI_RE.replace_all(v, "").trim().to_string())
        .unwrap_or_default();

    match cleaned.as_str() {
        "" | "NA" | "None" | "Unknown" | "null" => NOT_AVAILABLE.to_string(),
        _ => cleaned,
    }
}

/// Strip terminal color codes from a line of tool output
pub fn strip_ansi(line: &str) -> String {
    ANSI_RE.replace_all(line, "").into_owned()
}
