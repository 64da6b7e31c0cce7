//! Parsing of rsync's human-readable `--stats` and `--itemize-changes` output.
//!
//! Everything here is keyed on rsync's log phrasing. When the wording drifts,
//! the tables at the top of this file are the place to fix it.

/// Maximum number of file names kept per change category.
pub const SAMPLE_LIMIT: usize = 10;

/// A line containing any of these is transient progress output and skipped.
const PROGRESS_MARKERS: &[&str] = &[
    "kB/s",
    "MB/s",
    "GB/s",
    "%",
    "xfr#",
    "ir-chk",
    "to-chk",
    "speedup is",
];

/// Lowercase substrings that disqualify a candidate file name.
const NON_FILENAME_MARKERS: &[&str] = &[
    "kb/s",
    "mb/s",
    "gb/s",
    "%",
    "xfr#",
    "ir-chk",
    "to-chk",
    "receiving file list",
    "building file list",
    "speedup is",
    "delta-transmission",
    "total size is",
    "sent ",
    "received ",
    "(dry run)",
    "cannot stat",
    "failed to",
    "error",
];

const MAX_FILENAME_LEN: usize = 1000;

/// First column of an itemized line: `>` received, `<` sent, `*` message, `.` unchanged.
const ITEMIZE_UPDATE_TYPES: [char; 4] = ['>', '<', '*', '.'];
/// `YXcstpoguax`: update type, file type, then the 9-column change summary.
const ITEMIZE_PREFIX_LEN: usize = 11;
/// A run of `+` in the change summary means the file did not exist before.
const NEW_FILE_SUMMARY: &str = "+++++++";
const DELETE_MARKERS: [&str; 2] = ["*deleting", "deleting "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    TotalFiles,
    FilesTransferred,
    TotalSize,
    TransferredSize,
    BytesSent,
    BytesReceived,
}

const STAT_LABELS: &[(&str, StatField)] = &[
    ("Number of files:", StatField::TotalFiles),
    ("Number of regular files transferred:", StatField::FilesTransferred),
    ("Total file size:", StatField::TotalSize),
    ("Total transferred file size:", StatField::TransferredSize),
    ("Total bytes sent:", StatField::BytesSent),
    ("Total bytes received:", StatField::BytesReceived),
];

/// What a single stdout line contributes to [`RsyncStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Stat(StatField, u64),
    Added(&'a str),
    Updated(&'a str),
    Deleted(&'a str),
    Ignored,
}

/// Full count of one change category plus the first [`SAMPLE_LIMIT`] names.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct FileChanges {
    pub count: usize,
    pub samples: Vec<String>,
}

impl FileChanges {
    fn record(&mut self, name: &str) {
        self.count += 1;
        if self.samples.len() < SAMPLE_LIMIT {
            self.samples.push(name.to_string());
        }
    }

    /// Names beyond the first `shown` that the count accounts for.
    pub fn remaining(&self, shown: usize) -> usize {
        self.count.saturating_sub(shown)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RsyncStats {
    pub total_files: u64,
    pub files_transferred: u64,
    pub total_size: u64,
    pub transferred_size: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub added: FileChanges,
    pub updated: FileChanges,
    pub deleted: FileChanges,
}

impl RsyncStats {
    pub fn parse(stdout: &str) -> RsyncStats {
        let mut stats = RsyncStats::default();
        for line in stdout.lines() {
            match classify_line(line) {
                LineKind::Stat(field, value) => stats.set(field, value),
                LineKind::Added(name) => stats.added.record(name),
                LineKind::Updated(name) => stats.updated.record(name),
                LineKind::Deleted(name) => stats.deleted.record(name),
                LineKind::Ignored => {}
            }
        }
        stats
    }

    fn set(&mut self, field: StatField, value: u64) {
        let slot = match field {
            StatField::TotalFiles => &mut self.total_files,
            StatField::FilesTransferred => &mut self.files_transferred,
            StatField::TotalSize => &mut self.total_size,
            StatField::TransferredSize => &mut self.transferred_size,
            StatField::BytesSent => &mut self.bytes_sent,
            StatField::BytesReceived => &mut self.bytes_received,
        };
        *slot = value;
    }

    pub fn has_changes(&self) -> bool {
        self.added.count + self.updated.count + self.deleted.count > 0
    }
}

/// Classifies one line of rsync stdout.
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim_end_matches('\r');
    let trimmed = line.trim();
    if trimmed.is_empty() || PROGRESS_MARKERS.iter().any(|m| trimmed.contains(*m)) {
        return LineKind::Ignored;
    }

    if let Some((field, value)) = STAT_LABELS
        .iter()
        .find_map(|(label, field)| trimmed.strip_prefix(*label).map(|rest| (*field, rest)))
    {
        return LineKind::Stat(field, parse_count(value));
    }

    if let Some(rest) = DELETE_MARKERS
        .iter()
        .find_map(|marker| trimmed.strip_prefix(*marker))
    {
        let name = rest.trim();
        return if !name.ends_with('/') && is_valid_filename(name) {
            LineKind::Deleted(name)
        } else {
            LineKind::Ignored
        };
    }

    classify_itemized(line)
}

fn classify_itemized(line: &str) -> LineKind<'_> {
    if line.len() <= ITEMIZE_PREFIX_LEN
        || !line.starts_with(|c: char| ITEMIZE_UPDATE_TYPES.contains(&c))
    {
        return LineKind::Ignored;
    }
    let (Some(file_type), Some(summary), Some(name)) = (
        line.get(1..2),
        line.get(2..ITEMIZE_PREFIX_LEN),
        line.get(ITEMIZE_PREFIX_LEN..),
    ) else {
        return LineKind::Ignored;
    };
    let name = name.trim();
    if file_type != "f" || !is_valid_filename(name) {
        return LineKind::Ignored;
    }

    if summary.contains(NEW_FILE_SUMMARY) {
        LineKind::Added(name)
    } else if summary.chars().any(|c| c != '.' && c != ' ') {
        LineKind::Updated(name)
    } else {
        LineKind::Ignored
    }
}

/// Takes the first token after a stats label, e.g. `1,234` in `1,234 (reg: 1,200)`.
fn parse_count(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .map(|token| token.replace(',', ""))
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}

fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return false;
    }
    let lower = name.to_lowercase();
    if NON_FILENAME_MARKERS.iter().any(|m| lower.contains(*m)) {
        return false;
    }
    // Bare counters and timestamps such as `1,024` or `0:00:01`.
    !name
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | ':' | ','))
        .all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "receiving incremental file list
*deleting   old/report.txt
*deleting   old/
.d..t...... ./
>f+++++++++ photos/new.jpg
         12,345 100%   11.77MB/s    0:00:00 (xfr#1, to-chk=2/5)
>f.st...... docs/changed.odt
          8,192 100%    7.81MB/s    0:00:00 (xfr#2, to-chk=1/5)
.f          docs/same.txt
cd+++++++++ newdir/

Number of files: 1,234 (reg: 1,200, dir: 34)
Number of created files: 1 (reg: 1)
Number of deleted files: 1 (reg: 1)
Number of regular files transferred: 2
Total file size: 5,678,901 bytes
Total transferred file size: 20,537 bytes
Literal data: 20,537 bytes
Matched data: 0 bytes
File list size: 0
Total bytes sent: 104
Total bytes received: 20,904

sent 104 bytes  received 20,904 bytes  42,016.00 bytes/sec
total size is 5,678,901  speedup is 270.32
";

    #[test]
    fn parses_stats_block() {
        let stats = RsyncStats::parse(SAMPLE);
        assert_eq!(stats.total_files, 1234);
        assert_eq!(stats.files_transferred, 2);
        assert_eq!(stats.total_size, 5_678_901);
        assert_eq!(stats.transferred_size, 20_537);
        assert_eq!(stats.bytes_sent, 104);
        assert_eq!(stats.bytes_received, 20_904);
    }

    #[test]
    fn classifies_itemized_changes() {
        let stats = RsyncStats::parse(SAMPLE);
        assert_eq!(stats.added.samples, vec!["photos/new.jpg"]);
        assert_eq!(stats.updated.samples, vec!["docs/changed.odt"]);
        assert_eq!(stats.deleted.samples, vec!["old/report.txt"]);
        assert!(stats.has_changes());
    }

    #[test]
    fn missing_stats_default_to_zero() {
        let stats = RsyncStats::parse("");
        assert_eq!(stats, RsyncStats::default());
        assert!(!stats.has_changes());
    }

    #[test]
    fn unparsable_numbers_become_zero() {
        let stats = RsyncStats::parse("Total bytes sent: lots\nTotal file size: \nNumber of files: 7\n");
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.total_files, 7);
    }

    #[test]
    fn separators_are_stripped() {
        assert_eq!(
            classify_line("Number of files: 1,234"),
            LineKind::Stat(StatField::TotalFiles, 1234)
        );
    }

    #[test]
    fn progress_lines_are_never_classified() {
        for line in [
            ">f+++++++++ movie.mkv 45%",
            ">f.st...... 1.20MB/s",
            "*deleting   big.iso 3.4kB/s",
            ">f+++++++++ a (xfr#3, ir-chk=10/20)",
            "deleting 12%",
        ] {
            assert_eq!(classify_line(line), LineKind::Ignored, "{line}");
        }
    }

    #[test]
    fn rejects_status_text_as_filenames() {
        for line in [
            "deleting 0:00:01",
            "deleting sent 10 bytes",
            ">f+++++++++ rsync error: some files could not be transferred",
            ">f+++++++++ 1,024",
        ] {
            assert_eq!(classify_line(line), LineKind::Ignored, "{line}");
        }
    }

    #[test]
    fn only_regular_files_are_itemized() {
        assert_eq!(classify_line("cd+++++++++ newdir/"), LineKind::Ignored);
        assert_eq!(classify_line(">L+++++++++ link -> target"), LineKind::Ignored);
        assert_eq!(classify_line(".f          same.txt"), LineKind::Ignored);
        assert_eq!(classify_line(">f......... unchanged.txt"), LineKind::Ignored);
        assert_eq!(classify_line("<f+++++++++ pushed.txt"), LineKind::Added("pushed.txt"));
        assert_eq!(classify_line(">f..t...... touched.txt"), LineKind::Updated("touched.txt"));
    }

    #[test]
    fn plain_delete_marker_is_recognised() {
        assert_eq!(classify_line("deleting stale.log"), LineKind::Deleted("stale.log"));
        assert_eq!(classify_line("deleting cache/"), LineKind::Ignored);
    }

    #[test]
    fn samples_are_capped_but_counts_are_not() {
        let out: String = (0..25).map(|i| format!(">f+++++++++ file{i}.dat\n")).collect();
        let stats = RsyncStats::parse(&out);
        assert_eq!(stats.added.count, 25);
        assert_eq!(stats.added.samples.len(), SAMPLE_LIMIT);
        assert_eq!(stats.added.samples[0], "file0.dat");
        assert_eq!(stats.added.remaining(3), 22);
    }
}
