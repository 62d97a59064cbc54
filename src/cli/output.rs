use action_flow::{BatchReport, OperationOutcome, Verdict};
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Serialize `value` for the machine formats; `Human` falls back to YAML
pub fn print_value<T: Serialize>(format: &OutputFormat, value: &T) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Human | OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct RunOutput<'a> {
    outcomes: &'a [OperationOutcome],
    report: BatchReport,
}

pub fn print_outcomes(format: &OutputFormat, outcomes: &[OperationOutcome]) -> Result<()> {
    let report = BatchReport::from_outcomes(outcomes);
    match format {
        OutputFormat::Human => {
            for outcome in outcomes {
                println!("{}", human_line(outcome));
            }
            for line in report_lines(&report) {
                println!("{}", line);
            }
            Ok(())
        }
        other => print_value(other, &RunOutput { outcomes, report }),
    }
}

fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{}/{} items confirmed ({:.1}%)",
        report.confirmed, report.total, report.success_rate
    )];
    if let Some(timing) = report.timing {
        lines.push(format!(
            "item time avg {} ms (min {}, max {})",
            timing.avg_ms, timing.min_ms, timing.max_ms
        ));
    }
    if !report.common_issues.is_empty() {
        let issues: Vec<String> = report
            .common_issues
            .iter()
            .map(|issue| format!("{} x{}", issue.reason, issue.count))
            .collect();
        lines.push(format!("issues: {}", issues.join(", ")));
    }
    if !report.failed_products.is_empty() {
        let failed: Vec<&str> = report
            .failed_products
            .iter()
            .map(|product| product.product_id.as_str())
            .collect();
        lines.push(format!("not confirmed: {}", failed.join(", ")));
    }
    lines
}

fn human_line(outcome: &OperationOutcome) -> String {
    let request = outcome.request();
    let marker = match outcome.verdict() {
        Verdict::Succeeded | Verdict::AlreadyPresent => "ok",
        Verdict::Cancelled => "--",
        _ => "!!",
    };
    let mut line = format!(
        "[{}] {} x{} -> {} ({} attempt{})",
        marker,
        request.label.as_deref().unwrap_or(request.product_id.as_str()),
        request.quantity,
        outcome.verdict(),
        outcome.attempts().len(),
        if outcome.attempts().len() == 1 { "" } else { "s" }
    );
    if outcome.modal_encountered() {
        line.push_str(" [overlay dismissed]");
    }
    if let Some(detail) = outcome.detail() {
        line.push_str(": ");
        line.push_str(detail);
    }
    line
}
