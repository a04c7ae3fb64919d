//! Terminal summaries for runs and plans.

use std::path::Path;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use batchprep_core::{PipelineConfig, RunReport, UnitReport};

/// Per-unit summary rows: input, batches, read, written, dropped, output.
pub fn summary_rows(report: &RunReport) -> Vec<[String; 6]> {
    report.units.iter().map(unit_row).collect()
}

fn unit_row(unit: &UnitReport) -> [String; 6] {
    [
        file_label(&unit.input),
        unit.batches.to_string(),
        unit.rows_read.to_string(),
        unit.rows_written.to_string(),
        unit.rows_dropped().to_string(),
        output_label(&unit.outputs),
    ]
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn output_label(outputs: &[std::path::PathBuf]) -> String {
    match outputs {
        [] => "-".to_string(),
        [single] => single.display().to_string(),
        many => format!("{} files", many.len()),
    }
}

/// Step plan rows: position, kind, description.
pub fn plan_rows(config: &PipelineConfig) -> Vec<[String; 3]> {
    let mut rows = Vec::with_capacity(config.steps.len() + 1);
    if config.dedupe.scope().is_some() {
        rows.push([
            "-".to_string(),
            "dedupe".to_string(),
            format!("drop exact duplicate rows ({} scope)", config.dedupe),
        ]);
    }
    for (index, step) in config.steps.iter().enumerate() {
        rows.push([
            (index + 1).to_string(),
            step.kind().to_string(),
            step.describe(),
        ]);
    }
    rows
}

pub fn print_summary(report: &RunReport) {
    println!(
        "Statistics: {}  Dedupe: {}  Elapsed: {} ms",
        report.statistics_scope, report.dedupe, report.elapsed_ms
    );
    for reference in &report.references {
        let status = if reference.completeness.is_degraded() {
            "partial"
        } else {
            "complete"
        };
        println!(
            "Reference: {} ({} keys on {}, {status})",
            reference.path.display(),
            reference.keys,
            reference.key_column
        );
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Input"),
        header_cell("Batches"),
        header_cell("Read"),
        header_cell("Written"),
        header_cell("Dropped"),
        header_cell("Output"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for (unit, row) in report.units.iter().zip(summary_rows(report)) {
        let [input, batches, read, written, dropped, output] = row;
        let dropped = if unit.rows_dropped() > 0 {
            Cell::new(dropped).fg(Color::Yellow)
        } else {
            dim_cell(dropped)
        };
        table.add_row(vec![
            Cell::new(input).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(batches),
            Cell::new(read),
            Cell::new(written),
            dropped,
            Cell::new(output),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(report.batches()).add_attribute(Attribute::Bold),
        Cell::new(report.rows_read()).add_attribute(Attribute::Bold),
        Cell::new(report.rows_written()).add_attribute(Attribute::Bold),
        Cell::new(report.rows_dropped()).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");

    print_drop_table(report);
    print_warning_table(report);

    if report.cancelled {
        eprintln!("Run cancelled; completed batches were kept.");
    }
    if !report.is_conserved() {
        eprintln!("Row counts do not balance: read != written + dropped.");
    }
}

fn print_drop_table(report: &RunReport) {
    let dropped = report.dropped_by_rule();
    if dropped.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Rule"), header_cell("Rows")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (rule, count) in dropped {
        table.add_row(vec![Cell::new(rule), Cell::new(count)]);
    }
    println!();
    println!("Dropped rows:");
    println!("{table}");
}

fn print_warning_table(report: &RunReport) {
    if report.warning_count() == 0 {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Input"),
        header_cell("Stage"),
        header_cell("Column"),
        header_cell("First batch"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for unit in &report.units {
        for warning in &unit.warnings {
            table.add_row(vec![
                Cell::new(file_label(&unit.input)),
                Cell::new(&warning.stage),
                Cell::new(&warning.column).fg(Color::Yellow),
                Cell::new(warning.batch),
            ]);
        }
    }
    println!();
    println!("Columns skipped (not in input):");
    println!("{table}");
}

pub fn print_plan(config: &PipelineConfig) {
    println!(
        "Batch capacity: {}  Statistics: {}  Output: {}",
        config.batch_capacity,
        config.statistics,
        config.output.dir.display()
    );
    if let Some(column) = &config.output.partition_column {
        println!("Partitioned by: {column}");
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("#"), header_cell("Step"), header_cell("Details")]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for [position, kind, details] in plan_rows(config) {
        table.add_row(vec![
            dim_cell(position),
            Cell::new(kind).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(details),
        ]);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
