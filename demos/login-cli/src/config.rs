//! Runtime settings for the login CLI
//!
//! Reads logging and display preferences from the environment.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "mstodo_auth=info,mstodo_login=info";

/// Log filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Check if NO_COLOR environment variable is set
pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok()
}

/// Whether the browser should be opened automatically
pub fn auto_open_browser() -> bool {
    std::env::var("MSTODO_NO_BROWSER")
        .map(|v| !(v == "1" || v.eq_ignore_ascii_case("true")))
        .unwrap_or(true)
}

/// Render a remaining validity as `1h 05m` / `4m 10s`
pub fn format_remaining(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}
