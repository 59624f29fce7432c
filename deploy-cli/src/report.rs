//! Human-readable batch output.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use deploy_pipeline::{BatchReport, CatalogOutcome, RepoOutcome, RepoReport};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "ebook")]
    ebook: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn outcome_label(outcome: &RepoOutcome) -> &'static str {
    match outcome {
        RepoOutcome::Published { .. } => "published",
        RepoOutcome::Skipped { .. } => "skipped",
        RepoOutcome::Failed { .. } => "failed",
    }
}

fn outcome_detail(outcome: &RepoOutcome) -> String {
    match outcome {
        RepoOutcome::Published {
            plan,
            images,
            rewrites,
        } => {
            let mut parts = Vec::new();
            if plan.build.run {
                parts.push(format!("built, {} file(s) rewritten", rewrites.rewritten));
            }
            if plan.images.run {
                parts.push(format!("{images} image(s)"));
            }
            parts.join("; ")
        }
        RepoOutcome::Skipped { reason } => reason.clone(),
        RepoOutcome::Failed { stage, error } => format!("{stage}: {error}"),
    }
}

fn status_line(report: &RepoReport) -> String {
    let name = report
        .identifier
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| report.repo.display().to_string());
    let detail = outcome_detail(&report.outcome);
    match &report.outcome {
        RepoOutcome::Published { .. } => format!("{} {name} ({detail})", "✓".green()),
        RepoOutcome::Skipped { .. } => format!("{} {name} ({detail})", "–".yellow()),
        RepoOutcome::Failed { .. } => format!("{} {name}: {detail}", "✗".red()),
    }
}

/// Print one status line per repository, a summary table and the catalog result.
pub fn print_batch(batch: &BatchReport) {
    if batch.repos.is_empty() {
        println!("No repositories to deploy.");
        return;
    }

    for report in &batch.repos {
        println!("{}", status_line(report));
    }

    let rows: Vec<SummaryRow> = batch
        .repos
        .iter()
        .map(|report| SummaryRow {
            repository: report.repo.display().to_string(),
            ebook: report
                .identifier
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            result: outcome_label(&report.outcome).to_string(),
            detail: outcome_detail(&report.outcome),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    match &batch.catalogs {
        CatalogOutcome::Regenerated => println!("{} OPDS and RSS catalogs regenerated", "✓".green()),
        CatalogOutcome::Aborted => println!(
            "{} batch stopped at the first failure; catalogs not regenerated",
            "✗".red()
        ),
        CatalogOutcome::Failed(err) => println!("{} catalogs: {err}", "✗".red()),
    }
}
