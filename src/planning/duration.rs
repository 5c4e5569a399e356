use crate::planning::{plan::ParallelGroup, step::Step};

const DEFAULT_STEP_SECS: u64 = 5;

/// Seconds in an estimate such as "~5s", "~2m" or "3 min". Only the first
/// number counts; anything unparsable is five seconds.
pub fn parse_time_estimate(estimate: &str) -> u64 {
    let Some(start) = estimate.find(|c: char| c.is_ascii_digit()) else {
        return DEFAULT_STEP_SECS;
    };
    let rest = &estimate[start..];
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let Ok(value) = rest[..digits_end].parse::<u64>() else {
        return DEFAULT_STEP_SECS;
    };

    let unit: String = rest[digits_end..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();

    if estimate.to_lowercase().contains("min") || unit == "m" {
        value.saturating_mul(60)
    } else {
        value
    }
}

/// "~45s", "~2m", "~2m 30s"
pub fn format_duration(total_secs: u64) -> String {
    if total_secs < 60 {
        return format!("~{}s", total_secs);
    }
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if secs > 0 {
        format!("~{}m {}s", mins, secs)
    } else {
        format!("~{}m", mins)
    }
}

/// Max over parallel levels, sum over sequential ones, summed across levels.
pub fn estimate_duration_secs(steps: &[Step], groups: &[ParallelGroup]) -> u64 {
    groups
        .iter()
        .map(|group| {
            let times = group.step_ids.iter().filter_map(|id| {
                steps
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| parse_time_estimate(&s.estimated_time))
            });
            if group.parallel {
                times.max().unwrap_or(0)
            } else {
                times.fold(0, u64::saturating_add)
            }
        })
        .fold(0, u64::saturating_add)
}
