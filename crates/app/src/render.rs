//! Plain-text tables for the CLI.

use std::fmt::Write as _;

use services::Scoreboard;
use tracker_core::model::{Cohort, Event, Requirement};
use tracker_core::score::{CellDisplay, ScoreCell, ScoreboardRow, target_for};
use tracker_core::time::format_minutes;

fn cell(cell: &ScoreCell) -> String {
    match cell.display {
        CellDisplay::Checkbox if cell.is_complete() => "[x]".to_owned(),
        CellDisplay::Checkbox => "[ ]".to_owned(),
        CellDisplay::ProgressBar => format!("{}/{}", cell.value, cell.max),
    }
}

fn row_line(out: &mut String, row: &ScoreboardRow) {
    let graduated: Vec<&str> = row.graduated.iter().map(Cohort::as_str).collect();
    let _ = write!(
        out,
        "{:<20} {:<12} {:<10} {:>6} {:>+6} {:>6} {:>6.1}%",
        row.display_name,
        graduated.join(","),
        row.rating_system.display_name(),
        row.current_rating,
        row.rating_change,
        row.cohort_score,
        row.percent_complete,
    );
    for (_, score) in &row.cells {
        let _ = write!(out, " {:>9}", cell(score));
    }
    out.push('\n');
}

#[must_use]
pub fn scoreboard(board: &Scoreboard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scoreboard for {}", board.cohort);
    let mut header = format!(
        "{:<20} {:<12} {:<10} {:>6} {:>6} {:>6} {:>7}",
        "Name", "Graduated", "System", "Rating", "Change", "Score", "Percent"
    );
    for (idx, _) in board.columns.iter().enumerate() {
        let _ = write!(header, " {:>9}", format!("#{}", idx + 1));
    }
    let _ = writeln!(out, "{header}");
    for row in &board.members {
        row_line(&mut out, row);
    }

    if !board.columns.is_empty() {
        out.push_str("\nColumns:\n");
        for (idx, column) in board.columns.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{:<3} {} ({})",
                idx + 1,
                column.header_name,
                column.category
            );
        }
    }

    if !board.graduations.is_empty() {
        out.push_str("\nGraduations:\n");
        for row in &board.graduations {
            row_line(&mut out, row);
        }
    }
    out
}

#[must_use]
pub fn requirements(requirements: &[Requirement], cohort: &Cohort) -> String {
    let mut out = String::new();
    let mut category: Option<&str> = None;
    for requirement in requirements {
        if category != Some(requirement.category.as_str()) {
            let _ = writeln!(out, "{}", requirement.category);
            category = Some(&requirement.category);
        }
        let _ = writeln!(
            out,
            "  {:<40} target {:>4}{}",
            requirement.name,
            target_for(requirement, cohort),
            if requirement.is_hidden() { "  (hidden)" } else { "" },
        );
    }
    out
}

#[must_use]
pub fn events(events: &[Event], upcoming_meetings: Option<usize>) -> String {
    let mut out = String::new();
    for event in events {
        let kind = event
            .booked_type
            .map(|t| t.display_name())
            .unwrap_or("Open availability");
        let _ = writeln!(
            out,
            "{}  {:>7}  {:<22} {:<20} {}/{} participants  {:?}",
            event.start_time.format("%Y-%m-%d %H:%M"),
            format_minutes((event.end_time - event.start_time).num_minutes()),
            kind,
            event.owner_display_name,
            event.participants.len(),
            event.max_participants,
            event.status,
        );
    }
    if let Some(count) = upcoming_meetings {
        let _ = writeln!(out, "Upcoming meetings: {count}");
    }
    out
}
