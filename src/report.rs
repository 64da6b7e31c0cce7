//! Renders Telegram HTML messages for a sync run.
//!
//! Every function here is pure: the timestamp comes in through
//! [`ReportContext`] so the same results always produce the same text.

use chrono::{DateTime, Local, TimeDelta};
use itertools::Itertools;

use crate::config::JobSpec;
use crate::file_size::FileSize;
use crate::rsync::TransferResult;
use crate::rsync::stats::FileChanges;

/// Sample names shown per change category.
const SHOWN_SAMPLES: usize = 3;
/// Detailed blocks shown when every job failed.
const SHOWN_FAILURES: usize = 3;
const ERROR_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub timestamp: DateTime<Local>,
    pub source_server: &'a str,
    pub dest_label: &'a str,
}

impl ReportContext<'_> {
    fn time(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    AllSucceeded,
    AllFailed,
    Mixed,
}

impl ReportKind {
    pub fn of(results: &[TransferResult]) -> ReportKind {
        let failed = results.iter().filter(|r| !r.success()).count();
        if failed == 0 {
            ReportKind::AllSucceeded
        } else if failed == results.len() {
            ReportKind::AllFailed
        } else {
            ReportKind::Mixed
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `H:MM:SS`, prefixed with `N day(s), ` past one day. Sub-second parts are dropped.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let hms = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        n => format!("{n} days, {hms}"),
    }
}

fn total_duration(results: &[TransferResult]) -> TimeDelta {
    results
        .iter()
        .fold(TimeDelta::zero(), |acc, r| acc + r.duration())
}

pub fn started_message(jobs: &[JobSpec], ctx: &ReportContext) -> String {
    let mut message = String::new();
    message += "🔄 <b>Backup Sync Started</b>\n\n";
    message += &format!("📅 <b>Time:</b> {}\n", ctx.time());
    message += &format!("📁 <b>Directories:</b> {}\n\n", jobs.len());
    for job in jobs {
        message += &format!(
            "📂 {}: {} → {}\n",
            escape_html(&job.name),
            escape_html(&job.source_path),
            escape_html(&job.dest_path)
        );
    }
    message += &format!("\n<b>Source Server:</b> {}\n", escape_html(ctx.source_server));
    message += &format!("<b>Destination:</b> {}\n", escape_html(ctx.dest_label));
    message
}

pub fn test_message(timestamp: DateTime<Local>) -> String {
    format!(
        "🧪 <b>Test Notification</b>\n\n\
         📅 <b>Time:</b> {}\n\n\
         This is a test message from the backup sync tool.\n\
         If you can see this, Telegram notifications are working correctly! ✅\n",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn completion_message(results: &[TransferResult], ctx: &ReportContext) -> String {
    match ReportKind::of(results) {
        ReportKind::AllSucceeded => success_message(results, ctx),
        ReportKind::AllFailed => failure_message(results, ctx),
        ReportKind::Mixed => mixed_message(results, ctx),
    }
}

fn change_lines(icon: &str, label: &str, changes: &FileChanges) -> String {
    if changes.count == 0 {
        return String::new();
    }
    let mut out = format!("   {icon} {label}: {} files\n", changes.count);
    for name in changes.samples.iter().take(SHOWN_SAMPLES) {
        out += &format!("      • {}\n", escape_html(name));
    }
    if changes.count > SHOWN_SAMPLES {
        out += &format!("      ... and {} more\n", changes.remaining(SHOWN_SAMPLES));
    }
    out
}

fn success_message(results: &[TransferResult], ctx: &ReportContext) -> String {
    let mut message = String::new();
    message += "🟢 <b>Backup Sync Successful</b>\n\n";
    message += &format!("📅 <b>Time:</b> {}\n", ctx.time());
    message += &format!(
        "⏱️ <b>Total Duration:</b> {}\n",
        format_duration(total_duration(results))
    );
    message += &format!("📁 <b>Directories:</b> {}\n", results.len());

    for result in results {
        let stats = result.stats();
        let mut changes = change_lines("➕", "Added", &stats.added)
            + &change_lines("🔄", "Updated", &stats.updated)
            + &change_lines("🗑️", "Deleted", &stats.deleted);
        if changes.is_empty() {
            changes = "   ✅ No changes (files up to date)\n".into();
        }

        message += &format!("\n📂 <b>{}</b>\n", escape_html(&result.job.name));
        message += &format!("   ⏱️ Duration: {}\n", format_duration(result.duration()));
        message += &format!("   🗂️ Files: {}\n", stats.total_files);
        message += &format!("   📊 Transferred: {} files\n", stats.files_transferred);
        message += &format!("   💾 Size: {}\n", FileSize::from(stats.total_size));
        message += &format!("   📤 Sent: {}\n", FileSize::from(stats.bytes_sent));
        message += &format!("   📥 Received: {}\n", FileSize::from(stats.bytes_received));
        message += &changes;
    }
    message
}

fn failure_message(results: &[TransferResult], ctx: &ReportContext) -> String {
    let mut message = String::new();
    message += "🔴 <b>Backup Sync Failed</b>\n\n";
    message += &format!("📅 <b>Time:</b> {}\n", ctx.time());
    message += &format!(
        "⏱️ <b>Total Duration:</b> {}\n",
        format_duration(total_duration(results))
    );
    message += &format!("📁 <b>Failed Directories:</b> {}\n", results.len());

    for result in results.iter().take(SHOWN_FAILURES) {
        let error = result
            .error_summary()
            .unwrap_or_else(|| "Unknown error".into());
        message += &format!("\n📂 <b>{}</b>\n", escape_html(&result.job.name));
        message += &format!(
            "   ❌ Error: {}\n",
            escape_html(truncate_chars(&error, ERROR_EXCERPT_CHARS))
        );
        message += &format!(
            "   📍 {}:{} → {}:{}\n",
            escape_html(ctx.source_server),
            escape_html(&result.job.source_path),
            escape_html(ctx.dest_label),
            escape_html(&result.job.dest_path)
        );
    }
    if results.len() > SHOWN_FAILURES {
        message += &format!(
            "\n... and {} more failures\n",
            results.len() - SHOWN_FAILURES
        );
    }
    message += "\nPlease check the logs for more details.";
    message
}

fn mixed_message(results: &[TransferResult], ctx: &ReportContext) -> String {
    let (succeeded, failed): (Vec<&TransferResult>, Vec<&TransferResult>) =
        results.iter().partition(|r| r.success());

    let mut message = String::new();
    message += "🟡 <b>Backup Sync Partial Success</b>\n\n";
    message += &format!("📅 <b>Time:</b> {}\n", ctx.time());
    message += &format!(
        "⏱️ <b>Total Duration:</b> {}\n",
        format_duration(total_duration(results))
    );
    message += &format!("✅ <b>Successful:</b> {}\n", succeeded.len());
    message += &format!("❌ <b>Failed:</b> {}\n", failed.len());

    message += "\n<b>Successful:</b>\n";
    for result in succeeded {
        let stats = result.stats();
        let delta = [
            ('+', stats.added.count),
            ('~', stats.updated.count),
            ('-', stats.deleted.count),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(sign, count)| format!("{sign}{count}"))
        .join(" ");
        let delta = if delta.is_empty() {
            "no changes".to_string()
        } else {
            delta
        };
        message += &format!("📂 {} ({})\n", escape_html(&result.job.name), delta);
    }

    message += "\n<b>Failed:</b>\n";
    for result in failed {
        message += &format!("📂 {}\n", escape_html(&result.job.name));
    }
    message += "\nPlease check the logs for error details.";
    message
}
