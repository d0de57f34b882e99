//! Human-friendly CLI output formatters.
//!
//! Each `fmt_*` function renders one response shape for terminal display.
//! When `color` is true, ANSI escape codes are emitted via `owo_colors`.
//! Shapes without a dedicated formatter fall back to pretty JSON.

use crate::rpc::Resp;
use crate::types::Severity;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Prints `resp` to `w`: pretty JSON when `json` is true, otherwise the
/// best available human-readable rendering (falling back to JSON for
/// response shapes with no dedicated formatter).
///
/// # Errors
///
/// Returns an error if writing to `w` fails, or if JSON serialization fails.
pub fn print_resp(w: &mut impl Write, resp: &Resp, json: bool, color: bool) -> anyhow::Result<()> {
    if json {
        writeln!(w, "{}", serde_json::to_string_pretty(resp)?)?;
        return Ok(());
    }

    match resp {
        Resp::Memory { memory } => fmt_memory(w, memory, color)?,
        Resp::MemoryOpt { memory: Some(memory), .. } => fmt_memory(w, memory, color)?,
        Resp::MemoryOpt { memory: None, .. } => writeln!(w, "not found")?,
        Resp::MemoryList { memories } => {
            for m in memories {
                fmt_memory(w, m, color)?;
            }
        }
        Resp::TaskList { tasks } => {
            for t in tasks {
                fmt_task_line(w, t, color)?;
            }
        }
        Resp::Task { task } => fmt_task_line(w, task, color)?,
        Resp::TaskClaimed { task: Some(task), claimed: true } => {
            writeln!(w, "claimed:")?;
            fmt_task_line(w, task, color)?;
        }
        Resp::TaskClaimed { claimed: false, .. } => writeln!(w, "already claimed")?,
        Resp::FindingsList { findings } => {
            for f in findings {
                fmt_finding_line(w, f.severity, &f.category, &f.file_path, f.line, &f.title, color)?;
            }
        }
        Resp::Status { status } => {
            if color {
                writeln!(w, "{:<24} {}", "root:".bold(), status.root)?;
                writeln!(w, "{:<24} {}", "code index:".bold(), status.code_enabled)?;
                writeln!(w, "{:<24} {}", "findings:".bold(), status.findings_enabled)?;
                writeln!(w, "{:<24} {}", "watcher:".bold(), status.watcher_enabled)?;
            } else {
                writeln!(w, "{:<24} {}", "root:", status.root)?;
                writeln!(w, "{:<24} {}", "code index:", status.code_enabled)?;
                writeln!(w, "{:<24} {}", "findings:", status.findings_enabled)?;
                writeln!(w, "{:<24} {}", "watcher:", status.watcher_enabled)?;
            }
            if status.watcher_enabled {
                writeln!(w, "{:<24} {}", "  watched roots:", status.watcher_watched_roots.join(", "))?;
                writeln!(w, "{:<24} {}", "  directories:", status.watcher_directory_count)?;
                writeln!(w, "{:<24} {}ms", "  debounce:", status.watcher_debounce_ms)?;
                writeln!(w, "{:<24} {}", "  pending files:", status.watcher_pending_files)?;
            }
        }
        Resp::Health { ok } => {
            if *ok {
                writeln!(w, "{}", if color { "ok".green().to_string() } else { "ok".to_string() })?;
            } else {
                writeln!(w, "{}", if color { "unreachable".red().to_string() } else { "unreachable".to_string() })?;
            }
        }
        Resp::Count(n) => writeln!(w, "{n}")?,
        Resp::Bool(b) => writeln!(w, "{b}")?,
        Resp::Ok => writeln!(w, "ok")?,
        other => writeln!(w, "{}", serde_json::to_string_pretty(other)?)?,
    }
    Ok(())
}

fn fmt_memory(w: &mut impl Write, m: &crate::store::memory::Memory, color: bool) -> io::Result<()> {
    let tags = m.tags.iter().cloned().collect::<Vec<_>>().join(",");
    if color {
        writeln!(w, "{} [{}] {}", m.id.as_str().bold(), m.category.as_str().cyan(), m.content)?;
    } else {
        writeln!(w, "{} [{}] {}", m.id.as_str(), m.category.as_str(), m.content)?;
    }
    if !tags.is_empty() {
        writeln!(w, "  {}", if color { tags.dimmed().to_string() } else { tags })?;
    }
    Ok(())
}

fn fmt_task_line(w: &mut impl Write, t: &crate::store::task::Task, color: bool) -> io::Result<()> {
    if color {
        let status = match t.status.as_str() {
            "pending" => t.status.as_str().yellow().to_string(),
            "claimed" => t.status.as_str().blue().to_string(),
            "done" => t.status.as_str().green().to_string(),
            "blocked" => t.status.as_str().red().to_string(),
            other => other.to_string(),
        };
        writeln!(w, "{} {:<10} {}", t.id.as_str().bold(), status, t.title)?;
    } else {
        writeln!(w, "{} {:<10} {}", t.id.as_str(), t.status.as_str(), t.title)?;
    }
    Ok(())
}

fn fmt_finding_line(
    w: &mut impl Write,
    severity: Severity,
    category: &str,
    file_path: &str,
    line: u32,
    title: &str,
    color: bool,
) -> io::Result<()> {
    if color {
        let sev = match severity {
            Severity::Critical => severity.as_str().red().to_string(),
            Severity::Warning => severity.as_str().yellow().to_string(),
            Severity::Info => severity.as_str().dimmed().to_string(),
        };
        writeln!(w, "{:<8} {}:{} [{}] {}", sev, file_path.bold(), line, category, title)
    } else {
        writeln!(w, "{:<8} {}:{} [{}] {}", severity.as_str(), file_path, line, category, title)
    }
}
