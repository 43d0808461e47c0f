// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    colorize_health, colorize_level, colorize_pressure, format_bytes, format_duration,
    format_optional, format_percent, format_rate, format_sample_line, format_timestamp,
};
