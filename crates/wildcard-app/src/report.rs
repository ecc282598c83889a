// Plain-text squad report.
//
// A successful run lists the squad by position with a summary footer. A
// failed run renders a short "NO SQUAD PRODUCED" report that cannot be
// mistaken for a squad.

use std::path::Path;

use chrono::{DateTime, Local};
use wildcard_core::{ConstraintSet, OptimizationOutcome, Position};

/// Ownership below this counts as a differential in the breakdown.
pub const DIFFERENTIAL_PCT: f64 = 15.0;
/// Ownership above this counts as template in the breakdown.
pub const TEMPLATE_PCT: f64 = 25.0;

const RULE: &str = "============================================================\n";

// ---------------------------------------------------------------------------
// Success
// ---------------------------------------------------------------------------

pub fn render_success(
    outcome: &OptimizationOutcome,
    constraints: &ConstraintSet,
    generated_at: DateTime<Local>,
) -> String {
    let squad = &outcome.squad;
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("WILDCARD SQUAD\n");
    report.push_str(RULE);

    if let Some(reason) = &outcome.fallback {
        report.push_str(&format!(
            "NOTE: ownership limits could not be met and were dropped ({reason}).\n\n"
        ));
    }

    for pos in Position::ALL {
        let mut players: Vec<_> = squad.at_position(pos).collect();
        if players.is_empty() {
            continue;
        }
        players.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()));

        report.push_str(&format!("{} ({})\n", pos, players.len()));
        for p in players {
            report.push_str(&format!(
                "  {:<22} {:<6} {:>6.1} {:>8.2} {:>6.1}%\n",
                p.name, p.club, p.price, p.score, p.ownership_pct
            ));
        }
        report.push('\n');
    }

    // --- Summary ---
    let cost = squad.total_price();
    report.push_str(&format!(
        "Cost: {:.1} / {:.1} (remaining {:.1})\n",
        cost,
        constraints.budget,
        constraints.budget - cost
    ));
    report.push_str(&format!(
        "Objective: {:.2} (before refinement {:.2})\n",
        outcome.objective, outcome.base_objective
    ));

    if outcome.swaps.is_empty() {
        report.push_str("Swaps: none\n");
    } else {
        report.push_str(&format!("Swaps ({}):\n", outcome.swaps.len()));
        for swap in &outcome.swaps {
            report.push_str(&format!(
                "  {} {} ({:.1}%, {:.2}) -> {} ({:.1}%, {:.2})\n",
                swap.position,
                swap.outgoing.name,
                swap.outgoing.ownership_pct,
                swap.outgoing_adjusted,
                swap.incoming.name,
                swap.incoming.ownership_pct,
                swap.incoming_adjusted
            ));
        }
    }

    let differentials = squad
        .members()
        .iter()
        .filter(|c| c.ownership_pct < DIFFERENTIAL_PCT)
        .count();
    let template = squad
        .members()
        .iter()
        .filter(|c| c.ownership_pct > TEMPLATE_PCT)
        .count();
    report.push_str(&format!(
        "Ownership: {} differential (<{}%), {} template (>{}%)\n",
        differentials, DIFFERENTIAL_PCT, template, TEMPLATE_PCT
    ));

    let stacked: Vec<String> = squad
        .club_counts()
        .into_iter()
        .filter(|&(_, n)| n >= 2)
        .map(|(club, n)| format!("{club} x{n}"))
        .collect();
    if stacked.is_empty() {
        report.push_str("Clubs: no club has more than one player\n");
    } else {
        report.push_str(&format!("Clubs: {}\n", stacked.join(", ")));
    }

    report.push_str(&format!(
        "\nGenerated {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    report
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

pub fn render_failure(error: &dyn std::error::Error, generated_at: DateTime<Local>) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("NO SQUAD PRODUCED\n");
    report.push_str(RULE);
    report.push_str(&format!("Reason: {error}\n"));
    report.push_str(&format!(
        "\nGenerated {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    report
}

/// Write `text` to `path`, creating parent directories as needed.
pub fn write_report(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
