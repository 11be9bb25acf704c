//! Human-readable labels for cards and chart titles.

use dash_core::{ResourceKind, TopConsumer};
use std::time::Duration;

const BYTE_UNITS: [(u32, &str); 3] = [(30, "GiB"), (20, "MiB"), (10, "KiB")];

/// Binary-prefixed size with one decimal, e.g. `"1.5 KiB"`; plain bytes below 1 KiB.
pub fn format_bytes(bytes: u64) -> String {
    match BYTE_UNITS.iter().find(|(shift, _)| bytes >> shift > 0) {
        Some((shift, unit)) => format!("{:.1} {unit}", bytes as f64 / (1u64 << shift) as f64),
        None => format!("{bytes} B"),
    }
}

/// Net chart title: `"↑sent  ↓recv"`.
pub fn net_summary(bytes_sent: u64, bytes_recv: u64) -> String {
    format!("↑{}  ↓{}", format_bytes(bytes_sent), format_bytes(bytes_recv))
}

/// Whole mebibytes with thousands separators, e.g. `"12,345 MiB"`.
pub fn format_mib(mib: f64) -> String {
    let digits = (mib.max(0.0).round() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push_str(" MiB");
    out
}

/// `"3h 04m 05s"` under a day, `"2d 03h 04m"` beyond.
pub fn format_uptime(uptime: Duration) -> String {
    let secs  = uptime.as_secs();
    let mins  = secs / 60;
    let hours = mins / 60;
    let days  = hours / 24;

    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours % 24, mins % 60)
    } else {
        format!("{}h {:02}m {:02}s", hours, mins % 60, secs % 60)
    }
}

/// Card text: `"name (PID pid) – value"`, or `"–"` for the sentinel.
pub fn card_label(kind: ResourceKind, top: &TopConsumer) -> String {
    if top.is_sentinel() {
        return dash_core::SENTINEL_NAME.to_string();
    }
    let value = match kind {
        ResourceKind::Cpu => format!("{:.1}%", top.magnitude),
        ResourceKind::Ram | ResourceKind::Gpu | ResourceKind::Net => format_mib(top.magnitude),
    };
    format!("{} (PID {}) – {value}", top.name, top.pid)
}
