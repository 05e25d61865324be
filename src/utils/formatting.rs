use std::fmt::Display;
use crate::policy::{Category, CategorySetting, ModuleState, PluginDefinition};

pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = ms / 3_600_000;
        let mins = (ms % 3_600_000) / 60_000;
        format!("{}h {}m", hours, mins)
    }
}

/// Render an on/off flag the way the policy listing prints it.
pub fn format_enabled(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn setting<T: Display + PartialEq + Copy>(value: &CategorySetting<T>) -> String {
    match value {
        CategorySetting::Uniform(v) => v.to_string(),
        CategorySetting::Mixed => "MIXED".to_string(),
        CategorySetting::Empty => "-".to_string(),
    }
}

/// One line per category: name, threshold and strength.
pub fn category_line<T, S>(category: Category, threshold: &CategorySetting<T>, strength: &CategorySetting<S>) -> String
where
    T: Display + PartialEq + Copy,
    S: Display + PartialEq + Copy,
{
    format!("[{}] {:<24} threshold={} strength={}", category.id(), category, setting(threshold), setting(strength))
}

pub fn scanner_line(definition: &PluginDefinition, state: &ModuleState) -> String {
    format!(
        "{:>6} {:<40} {:<3} threshold={} strength={}",
        definition.id,
        definition.name,
        format_enabled(state.enabled),
        state.threshold,
        state.strength
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
        assert_eq!(format_duration(3_720_000), "1h 2m");
    }

    #[test]
    fn test_category_line_marks_mixed_settings() {
        use crate::policy::{AlertThreshold, AttackStrength};
        let line = category_line(
            Category::Injection,
            &CategorySetting::<AlertThreshold>::Mixed,
            &CategorySetting::Uniform(AttackStrength::High),
        );
        assert!(line.contains("threshold=MIXED"));
        assert!(line.contains("strength=HIGH"));
    }

    #[test]
    fn test_format_enabled() {
        assert_eq!(format_enabled(true), "on");
        assert_eq!(format_enabled(false), "off");
    }
}
