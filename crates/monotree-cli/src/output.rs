//! Terminal output for the monotree CLI.
//!
//! Human-readable output goes through the helpers here; `--format json`
//! prints the underlying report instead.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::style;
use monotree_tree::{ChangeKind, FileChange};
use monotree_workspace::{ProjectConfiguration, RunReport};
use serde::Serialize;
use std::fmt::Display;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output for scripting
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

/// Print a success message
pub fn success(msg: impl Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: impl Display) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: impl Display) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a section header
pub fn header(msg: impl Display) {
    println!("\n{}", style(msg).bold().underlined());
}

/// One staged change, colored by kind
pub fn change(change: &FileChange) {
    let label = change.kind.to_string();
    let label = match change.kind {
        ChangeKind::Create => style(label).green(),
        ChangeKind::Update => style(label).yellow(),
        ChangeKind::Delete => style(label).red(),
    };
    println!("{} {}", label, change.path);
}

/// Changes, commit statistics and tasks of a generator run
pub fn run_summary(report: &RunReport) {
    if report.changes.is_empty() {
        info("Nothing to change");
    }
    for staged in &report.changes {
        change(staged);
    }

    match &report.commit {
        Some(commit) => success(format!(
            "Wrote {} file(s) and deleted {} in {} ms",
            commit.files_written, commit.files_deleted, commit.duration_ms
        )),
        None => warning("Dry run: nothing was written"),
    }
    for task in &report.tasks_run {
        success(format!("Ran task '{}'", task));
    }
    for task in &report.tasks_skipped {
        info(format!("Skipped task '{}'", task));
    }
}

/// Registry listing, one row per project
pub fn project_table<'a>(projects: impl IntoIterator<Item = &'a ProjectConfiguration>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Name", "Type", "Root", "Source Root", "Targets"]
                .into_iter()
                .map(|h| Cell::new(h).fg(Color::Cyan)),
        );

    for project in projects {
        let targets: Vec<&str> = project.targets.keys().map(String::as_str).collect();
        table.add_row(vec![
            Cell::new(&project.name),
            Cell::new(project.project_type.map_or_else(|| "-".to_string(), |t| t.to_string())),
            Cell::new(&project.root),
            Cell::new(project.source_root.as_deref().unwrap_or("-")),
            Cell::new(targets.join(", ")),
        ]);
    }
    table
}

/// Print structured data as pretty JSON
pub fn json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use monotree_tree::TreePath;
    use monotree_workspace::ProjectType;

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::from_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Human);
    }

    #[test]
    fn test_project_table() {
        let mut demo = ProjectConfiguration::new("demo", TreePath::new("apps/demo").unwrap());
        demo.project_type = Some(ProjectType::Application);
        let ui = ProjectConfiguration::new("ui", TreePath::new("libs/ui").unwrap());

        let table = project_table([&demo, &ui]);
        assert_eq!(table.row_count(), 2);
        assert!(table.to_string().contains("application"));
    }
}
