//! Human-readable rendering of a sync report.

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use fedisync_core::models::Category;
use fedisync_core::report::SyncReport;

use crate::style;

/// Print the whole report: plans (dry run only), tally table, warnings,
/// skipped accounts, and failures.
pub fn print_report(report: &SyncReport) {
    println!();
    println!("{}", style::header("fedisync report"));
    println!("{}", style::dim(&format!("started {}", report.started_at)));
    println!();

    if report.dry_run {
        println!("{}", style::dry_run());
        println!();
        print_plans(report);
    }

    println!("{}", summary_table(report));
    println!();

    for instance in &report.instances {
        for warning in &instance.warnings {
            println!(
                "{}",
                style::warn(&format!(
                    "{}: could not read {} ({}); treated as empty",
                    instance.label, warning.category, warning.detail
                ))
            );
        }
    }

    if !report.skipped.is_empty() {
        println!("{}", style::header("Skipped accounts"));
        for skipped in &report.skipped {
            println!(
                "  {}",
                style::error(&format!("{} ({}): {}", skipped.label, skipped.site, skipped.reason))
            );
        }
        println!();
    }

    let failures = report.failures();
    if failures.is_empty() {
        println!(
            "{}",
            style::success(&format!(
                "{} instance(s) synchronized without failures",
                report.instances.len()
            ))
        );
    } else {
        println!("{}", style::header(&format!("Failures ({})", failures.len())));
        for failure in &failures {
            println!(
                "  {}",
                style::error(&format!(
                    "{} · {} · {}: {}",
                    failure.label, failure.category, failure.target, failure.reason
                ))
            );
        }
    }
    println!();
}

fn print_plans(report: &SyncReport) {
    for plan in &report.plans {
        println!("{} {}", style::account(&plan.label), style::dim(&plan.site));
        if plan.ops.is_empty() {
            println!("  {}", style::dim("nothing to do"));
        }
        for op in &plan.ops {
            println!("  + {}", op);
        }
        println!();
    }
}

/// One row per instance and category.
pub fn summary_table(report: &SyncReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Account", "Category", "Applied", "Already", "Failed"]);

    for instance in &report.instances {
        for category in Category::ALL {
            let tally = instance.tally(category);
            let failed = if tally.failed > 0 {
                Cell::new(tally.failed).fg(Color::Red)
            } else {
                Cell::new(tally.failed)
            };
            table.add_row(vec![
                Cell::new(&instance.label),
                Cell::new(category),
                Cell::new(tally.applied),
                Cell::new(tally.already_satisfied),
                failed,
            ]);
        }
    }

    table
}
