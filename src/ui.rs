use colored::*;
use jiff::civil::Date;

use wbs::models::board::BoardColumn;
use wbs::models::node::WbsNode;
use wbs::models::status::{Canonical, Priority, Status};
use wbs::services::dependencies::DateShift;
use wbs::services::normalizer::{PriorityNormalizer, StatusNormalizer};
use wbs::services::scheduler::Schedule;
use wbs::services::stats::TreeStats;
use wbs::services::tree;

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Glyph for a status, colored by how worrying it is
pub fn get_status_glyph(status: Status) -> ColoredString {
    match status {
        Status::Done => "✓".dimmed(),
        Status::InProgress | Status::Review => "◐".yellow(),
        Status::Delayed | Status::Blocked => "●".red(),
        Status::Risk => "▲".red(),
        Status::Backlog | Status::Todo => "○".normal(),
    }
}

fn color_priority(priority: Priority) -> ColoredString {
    match priority {
        Priority::Critical => priority.as_str().red().bold(),
        Priority::High => priority.as_str().yellow(),
        Priority::Medium => priority.as_str().normal(),
        Priority::Low => priority.as_str().dimmed(),
    }
}

/// Format a date range as "Jan 10 → Jan 12", keeping whichever side is set
pub fn format_date_range(start: Option<Date>, end: Option<Date>) -> Option<String> {
    let fmt = |date: Date| date.strftime("%b %d").to_string();
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("{} → {}", fmt(start), fmt(end))),
        (Some(start), None) => Some(format!("from {}", fmt(start))),
        (None, Some(end)) => Some(format!("until {}", fmt(end))),
        (None, None) => None,
    }
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours}h")
}

/// Dates and effort shown on the right of a node line
fn node_context(node: &WbsNode) -> Option<String> {
    let parts: Vec<String> = [
        format_date_range(node.start_date, node.end_date),
        node.estimate_hours.map(format_hours),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!parts.is_empty()).then(|| parts.join("  ·  "))
}

/// Render one node with code, glyph, title and right-aligned dates/effort
pub fn render_node_line(node: &WbsNode, depth: u32) {
    let terminal_width = get_terminal_width();

    let indent = "  ".repeat(depth as usize);
    let code = node.wbs_code.as_deref().unwrap_or("-");
    let glyph = get_status_glyph(node.status);
    let left_section = format!("  {}{:<8} {}  {}", indent, code, glyph, node.title);

    let styled_left = if node.is_deleted() || node.status == Status::Done {
        left_section.dimmed()
    } else if depth == 0 {
        left_section.bold()
    } else {
        left_section.normal()
    };

    let Some(right_section) = node_context(node) else {
        println!("{}", styled_left);
        return;
    };

    let left_visible_len = left_section.chars().count();
    let right_visible_len = right_section.chars().count();
    let total_content = left_visible_len + right_visible_len;

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!("{}{}{}", styled_left, " ".repeat(padding), right_section.dimmed());
    } else {
        // Not enough space for right alignment
        println!("{}", styled_left);
    }
}

/// Render a forest in tree order
pub fn render_tree(forest: &[WbsNode]) {
    for (node, depth) in tree::walk(forest) {
        render_node_line(node, depth);
    }
}

/// Render every field of a node worth showing
pub fn render_node_details(node: &WbsNode, statuses: &StatusNormalizer, priorities: &PriorityNormalizer) {
    let field = |name: &str, value: String| println!("  {:<14} {}", name.dimmed(), value);

    println!(
        "\n  {} {}\n",
        node.wbs_code.as_deref().unwrap_or("-").cyan().bold(),
        node.title.bold()
    );
    field("id", node.id.clone());
    field(
        "status",
        format!("{} {}", get_status_glyph(node.status), statuses.label_for(node.status)),
    );
    field(
        "priority",
        format!("{} ({})", color_priority(node.priority), priorities.label_for(node.priority)),
    );
    if let Some(parent_id) = &node.parent_id {
        field("parent", parent_id.clone());
    }
    if let Some(range) = format_date_range(node.start_date, node.end_date) {
        field("dates", range);
    }
    if let Some(hours) = node.estimate_hours {
        field("estimate", format_hours(hours));
    }
    if !node.dependencies.is_empty() {
        field("depends on", node.dependencies.join(", "));
    }
    if let Some(service) = &node.service_catalog_id {
        let multiplier = node.service_multiplier.unwrap_or(1.0);
        let hours = node.service_hours.map(format_hours).unwrap_or_else(|| "-".into());
        field("service", format!("{service} × {multiplier} = {hours}"));
    }
    if let Some(responsible) = &node.responsible {
        field("responsible", responsible.name.clone());
    }
    if let Some(description) = &node.description {
        println!("\n  {}", description);
    }
    if node.is_deleted() {
        println!("\n  {}", "deleted".red());
    }
    println!();
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let word = if count == 1 { "node" } else { "nodes" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, word);
}

/// Render a section header
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Render the board one column after another
pub fn render_board(columns: &[BoardColumn]) {
    for column in columns {
        let count = match column.wip_limit {
            Some(limit) => format!("{}/{}", column.tasks.len(), limit),
            None => column.tasks.len().to_string(),
        };
        let count = if column.is_over_limit() {
            count.red()
        } else {
            count.dimmed()
        };
        println!("\n  {} {} {}", column.label.bold(), column.id.dimmed(), count);

        for (index, task) in column.tasks.iter().enumerate() {
            println!(
                "  {:>3}  {}  {:<8} {}",
                index.to_string().dimmed(),
                get_status_glyph(task.status),
                task.code.as_deref().unwrap_or("-"),
                task.title
            );
        }
    }
    println!();
}

pub fn render_schedule(node: &WbsNode, schedule: &Schedule) {
    println!(
        "  {}  {} → {}  ·  {}",
        node.title.bold(),
        schedule.start_date,
        schedule.end_date,
        format_hours(schedule.estimate_hours)
    );
}

/// Render the date shifts of a propagation, old dates struck through
pub fn render_shifts(shifts: &[DateShift]) {
    if shifts.is_empty() {
        println!("Nothing to reschedule");
        return;
    }
    render_section_header(&format!("{} rescheduled", shifts.len()));
    for shift in shifts {
        let previous = format_date_range(shift.previous_start, shift.previous_end).unwrap_or_else(|| "undated".into());
        let current = format_date_range(Some(shift.start_date), Some(shift.end_date)).unwrap_or_default();
        println!("  {:<12} {}  {}", shift.id, previous.strikethrough().dimmed(), current.green());
    }
    println!();
}

pub fn render_stats(stats: &TreeStats, statuses: &StatusNormalizer) {
    render_view_header("Summary", stats.active);
    println!("  {:<14} {}", "deleted".dimmed(), stats.deleted);
    println!("  {:<14} {}", "estimate".dimmed(), format_hours(stats.estimate_hours));
    println!("  {:<14} {}", "service".dimmed(), format_hours(stats.service_hours));
    println!("  {:<14} {:.0}%", "done".dimmed(), stats.completion() * 100.0);

    if !stats.by_status.is_empty() {
        render_section_header("By status");
        for (status, count) in &stats.by_status {
            println!("  {}  {:<20} {}", get_status_glyph(*status), statuses.label_for(*status), count);
        }
    }
    println!();
}
