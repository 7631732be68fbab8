//! Terminal rendering of board snapshots.

use console::style;

use hiring_board::board::store::BoardSnapshot;
use hiring_board::board::{ChannelState, Column};

pub fn success(message: &str) -> String {
    format!("{} {}", style("✓").green().bold(), message)
}

pub fn print_board(snapshot: &BoardSnapshot) {
    println!("{}", format_board(snapshot));
}

pub fn format_board(snapshot: &BoardSnapshot) -> String {
    let mut out = String::new();

    let connection = match snapshot.connection {
        ChannelState::Connected => style(snapshot.connection.to_string()).green(),
        ChannelState::Connecting => style(snapshot.connection.to_string()).yellow(),
        ChannelState::Exhausted => style(snapshot.connection.to_string()).red(),
        ChannelState::Disconnected => style(snapshot.connection.to_string()).dim(),
    };
    out.push_str(&format!("{}  {}", style(&snapshot.job_name).bold(), connection));
    if let Some(user) = &snapshot.session {
        out.push_str(&format!("  as {}", style(&user.name).cyan()));
    }
    out.push('\n');

    if snapshot.is_loading {
        out.push_str(&format!("{}\n", style("Loading...").dim()));
    }
    if let Some(error) = &snapshot.error {
        out.push_str(&format!("{} {}\n", style("!").red().bold(), style(error).red()));
    }

    match &snapshot.columns {
        Ok(columns) => {
            for column in columns {
                out.push_str(&format_column(column));
            }
        }
        Err(e) => out.push_str(&format!("{} {}\n", style("!").red().bold(), e)),
    }
    out
}

fn format_column(column: &Column) -> String {
    let mut out = format!(
        "\n{} ({})\n",
        style(&column.name).yellow().bold(),
        column.candidates_count
    );
    if column.candidates.is_empty() {
        out.push_str(&format!("  {}\n", style("(empty)").dim()));
    }
    for candidate in &column.candidates {
        out.push_str(&format!(
            "  #{:<5} {:<32} {}\n",
            candidate.id,
            candidate.email,
            style(format!("@{}", candidate.position)).dim()
        ));
    }
    if column.has_more_candidates {
        let remaining = column.candidates_count - column.candidates.len() as u64;
        out.push_str(&format!(
            "  {}\n",
            style(format!(
                "… {} more (next page after {})",
                remaining, column.last_position
            ))
            .dim()
        ));
    }
    out
}
