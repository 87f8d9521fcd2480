//! Display helpers for byte quantities

const BASE: u64 = 1024;
const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format a byte count with two decimals, e.g. `1536` -> `"1.5 KB"`
pub fn format_bytes(bytes: i64) -> String {
    format_bytes_with_decimals(bytes, 2)
}

/// Format a byte count using base-1024 units.
///
/// The mantissa is rounded to `decimals` places and trailing zeros are
/// dropped. Values of 1024 TB and above stay in TB. Negative values are
/// formatted by magnitude with a leading minus sign.
pub fn format_bytes_with_decimals(bytes: i64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let magnitude = format_magnitude(bytes.unsigned_abs(), decimals);
    if bytes < 0 {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

fn format_magnitude(bytes: u64, decimals: usize) -> String {
    // floor(log1024(bytes)) without floating point error at exact powers
    let mut exponent = 0;
    let mut threshold = BASE;
    while exponent < UNITS.len() - 1 && bytes >= threshold {
        exponent += 1;
        threshold = threshold.saturating_mul(BASE);
    }

    let scaled = bytes as f64 / (BASE as f64).powi(exponent as i32);
    let mut mantissa = format!("{:.*}", decimals, scaled);
    if mantissa.contains('.') {
        let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.').len();
        mantissa.truncate(trimmed);
    }

    format!("{} {}", mantissa, UNITS[exponent])
}

/// Share of `total` used, as a whole percentage; 0 when `total` is 0
pub fn get_storage_usage_percentage(used: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    // Halves round up
    ((used as f64 / total as f64) * 100.0 + 0.5).floor() as i64
}
