use serde::Serialize;

use crate::io::gateway::LoadSource;
use crate::model::session::User;
use crate::model::task::{Task, TaskPath};
use crate::ops::counters::{self, TreeStats};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskDetailJson<'a> {
    pub path: String,
    #[serde(flatten)]
    pub task: &'a Task,
    pub stats: TreeStats,
}

#[derive(Serialize)]
pub struct AddedJson<'a> {
    pub path: String,
    pub id: &'a str,
}

#[derive(Serialize)]
pub struct SessionJson<'a> {
    pub user: Option<&'a User>,
}

#[derive(Serialize)]
pub struct SyncJson {
    pub source: &'static str,
    pub roots: usize,
}

pub fn source_name(source: LoadSource) -> &'static str {
    match source {
        LoadSource::Remote => "remote",
        LoadSource::LocalCache => "local",
        LoadSource::DefaultSeed => "default",
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Shown by `list` when there is nothing to list
pub const EMPTY_TREE: &str = "No tasks yet. Add one with `tw add <text>`.";

fn checkbox(task: &Task) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

fn fold_marker(task: &Task) -> &'static str {
    match (task.has_subtasks(), task.is_expanded) {
        (false, _) => "•",
        (true, true) => "▾",
        (true, false) => "▸",
    }
}

/// One task as a single line: fold marker, path, checkbox, emoji, text
pub fn format_task_line(task: &Task, path: &TaskPath) -> String {
    format!(
        "{} {} {} {} {}",
        fold_marker(task),
        path,
        checkbox(task),
        task.emoji,
        task.text
    )
}

/// Render the forest, indenting two spaces per level. Children of a collapsed
/// task are skipped unless `show_all` is set; the number skipped is noted on
/// the collapsed task's line.
pub fn format_tree(roots: &[Task], show_all: bool) -> Vec<String> {
    let mut lines = Vec::new();
    push_level(roots, &TaskPath::default(), show_all, &mut lines);
    lines
}

fn push_level(tasks: &[Task], prefix: &TaskPath, show_all: bool, lines: &mut Vec<String>) {
    for (i, task) in tasks.iter().enumerate() {
        let path = prefix.child(i);
        let indent = "  ".repeat(prefix.len());
        let mut line = format!("{}{}", indent, format_task_line(task, &path));
        let open = task.is_expanded || show_all;
        if task.has_subtasks() && !open {
            line.push_str(&format!(
                "  (+{} hidden)",
                counters::count_total(&task.subtasks)
            ));
        }
        lines.push(line);
        if open {
            push_level(&task.subtasks, &path, show_all, lines);
        }
    }
}

pub fn format_stats(stats: &TreeStats) -> String {
    format!("{} / {} done", stats.completed, stats.total)
}

/// Detailed view of one task and its whole subtree
pub fn format_task_detail(task: &Task, path: &TaskPath) -> Vec<String> {
    let mut lines = vec![
        format!("{} {} {}", checkbox(task), task.emoji, task.text),
        format!("path: {}", path),
        format!("id: #{}", task.id),
    ];
    if task.has_subtasks() {
        lines.push(format!(
            "subtasks: {}",
            format_stats(&counters::stats(&task.subtasks))
        ));
        lines.push(String::new());
        let mut sub = Vec::new();
        push_level(&task.subtasks, path, true, &mut sub);
        // Indent relative to the task rather than the root
        let strip = "  ".repeat(path.len());
        lines.extend(sub.into_iter().map(|l| {
            let rel = l.strip_prefix(&strip).unwrap_or(&l).to_string();
            format!("  {}", rel)
        }));
    }
    lines
}

pub fn format_user(user: Option<&User>) -> String {
    match user {
        Some(u) => format!("{} (id {})", u.email, u.id),
        None => "not logged in".to_string(),
    }
}
