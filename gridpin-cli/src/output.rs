//! Output formatting utilities

use std::time::Duration;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use gridpin_core::domain::{format_rupees, Coordinate, GRID_SIZE};
use gridpin_core::Grid;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn grid_table(label: impl Fn(usize, usize) -> String) -> Table {
    let mut table = create_table();
    let mut header = vec![Cell::new("")];
    header.extend((0..GRID_SIZE).map(|c| Cell::new(c).set_alignment(CellAlignment::Center)));
    table.set_header(header);

    for row in 0..GRID_SIZE {
        let mut cells = vec![Cell::new(row)];
        cells.extend((0..GRID_SIZE).map(|col| Cell::new(label(row, col)).set_alignment(CellAlignment::Center)));
        table.add_row(cells);
    }
    table
}

/// The login grid, digits only
pub fn render_grid(grid: &Grid) -> Table {
    grid_table(|row, col| grid.rows()[row][col].to_string())
}

/// The enrollment grid; selected cells show their order
pub fn render_selection(selected: &[Coordinate]) -> Table {
    grid_table(|row, col| {
        selected
            .iter()
            .position(|c| c.row as usize == row && c.col as usize == col)
            .map(|i| (i + 1).to_string())
            .unwrap_or_else(|| "·".to_string())
    })
}

/// Amount with rupee sign and Indian digit grouping
pub fn money(amount: i64) -> String {
    format_rupees(amount)
}

/// Spinner for calls to the language model
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
