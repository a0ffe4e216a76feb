use crate::billing::ClaudePlan;
use crate::monitor::UsageMonitor;
use chrono::{DateTime, Duration, Utc};
use std::fmt::{self, Write};

const BAR_LENGTH: usize = 20;

/// Format an integer with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Render the one-shot usage report.
///
/// `plan` marks the configured plan next to the auto-detected one.
pub fn render_report(monitor: &UsageMonitor, plan: Option<ClaudePlan>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, monitor, plan, now);
    out
}

fn write_report(
    out: &mut impl Write,
    monitor: &UsageMonitor,
    plan: Option<ClaudePlan>,
    now: DateTime<Utc>,
) -> fmt::Result {
    writeln!(
        out,
        "Loaded {} entries across {} sessions",
        monitor.entry_count(),
        monitor.session_count()
    )?;

    if monitor.is_empty() {
        writeln!(out, "No usage data found.")?;
        return Ok(());
    }

    writeln!(out, "\n--- Overall Statistics ---")?;
    writeln!(out, "Total tokens: {}", format_number(monitor.total_tokens()))?;
    writeln!(out, "Total cost: ${:.6}", monitor.total_cost())?;
    writeln!(out, "Total weighted tokens: {:.2}", monitor.total_weighted_tokens())?;

    if let Some(avg) = monitor.average_burn_rate() {
        writeln!(
            out,
            "Average burn rate: {:.2} tokens/minute, ${:.4}/hour",
            avg.tokens_per_minute, avg.cost_per_hour
        )?;
    }
    if let Some(peak) = monitor.peak_burn_rate() {
        writeln!(
            out,
            "Peak burn rate: {:.2} tokens/minute, ${:.4}/hour",
            peak.tokens_per_minute, peak.cost_per_hour
        )?;
    }

    writeln!(out, "\n--- Current Rates ---")?;
    writeln!(
        out,
        "Hourly burn rate: {:.2} tokens/minute",
        monitor.calculate_hourly_burn_rate(now)
    )?;
    writeln!(
        out,
        "Tokens per second: {:.4}",
        monitor.calculate_tokens_per_second(now)
    )?;
    if let Some(current) = monitor.current_burn_rate() {
        writeln!(
            out,
            "Current session burn rate: {:.2} tokens/minute, ${:.4}/hour {}",
            current.tokens_per_minute,
            current.cost_per_hour,
            current.trend.arrow()
        )?;
    }

    if let Some(projection) = monitor.project_current_usage(now) {
        writeln!(out, "\n--- Current Session Projection ---")?;
        writeln!(out, "Current tokens: {}", format_number(projection.current_tokens))?;
        writeln!(out, "Current cost: ${:.6}", projection.current_cost)?;
        writeln!(
            out,
            "Projected additional tokens: {}",
            format_number(projection.projected_additional_tokens)
        )?;
        writeln!(
            out,
            "Projected additional cost: ${:.6}",
            projection.projected_additional_cost
        )?;
        writeln!(
            out,
            "Projected total tokens: {}",
            format_number(projection.projected_total_tokens())
        )?;
        writeln!(out, "Projected total cost: ${:.6}", projection.projected_total_cost())?;
    }

    writeln!(out, "\n--- Model Breakdown ---")?;
    for (model, (tokens, cost)) in monitor.model_breakdown() {
        writeln!(out, "{}: {} tokens, ${:.6}", model, format_number(tokens), cost)?;
    }

    writeln!(out, "\n--- Supported Models ---")?;
    for model in monitor.supported_models() {
        writeln!(out, "- {}", model)?;
    }

    write_plan_analysis(out, monitor, plan, now)
}

fn write_plan_analysis(
    out: &mut impl Write,
    monitor: &UsageMonitor,
    plan: Option<ClaudePlan>,
    now: DateTime<Utc>,
) -> fmt::Result {
    writeln!(out, "\n--- Claude Plan Usage Analysis ---")?;

    let weighted_tokens = monitor.total_weighted_tokens() as u64;
    let detected_plan = ClaudePlan::detect(weighted_tokens);

    writeln!(
        out,
        "Auto-detected plan: {} (based on current usage)",
        detected_plan.description()
    )?;
    if let Some(plan) = plan {
        writeln!(out, "Configured plan: {}", plan.description())?;
    }
    writeln!(out)?;

    for candidate in ClaudePlan::ALL {
        let percentage = monitor.plan_usage_percentage(candidate);
        let max_tokens = candidate.max_tokens();

        writeln!(out, "{}:", candidate.description())?;

        if weighted_tokens < max_tokens {
            if let Some(time_to_limit) = monitor.estimate_time_to_plan_limit(candidate) {
                writeln!(out, "  Time remaining: {}", format_duration(time_to_limit))?;
                writeln!(
                    out,
                    "  Will be reached at: {}",
                    (now + time_to_limit).format("%Y-%m-%d %H:%M UTC")
                )?;
            }
        } else {
            writeln!(out, "  Status: EXCEEDED ({:.1}% over limit)", percentage - 100.0)?;
        }

        let mut markers = String::new();
        if candidate == detected_plan {
            markers.push_str(" ← DETECTED");
        }
        if Some(candidate) == plan {
            markers.push_str(" ← CONFIGURED");
        }

        writeln!(
            out,
            "  Usage: [{}] {:.1}% ({}/{}){}",
            usage_bar(percentage),
            percentage,
            format_number(weighted_tokens),
            format_number(max_tokens),
            markers
        )?;
        writeln!(out)?;
    }

    Ok(())
}

/// Fixed width bar, full once the limit is passed
fn usage_bar(percentage: f64) -> String {
    let filled = (((percentage / 100.0) * BAR_LENGTH as f64).max(0.0) as usize).min(BAR_LENGTH);
    "█".repeat(filled) + &"░".repeat(BAR_LENGTH - filled)
}

fn format_duration(duration: Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
