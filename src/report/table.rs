//! Terminal table rendering for tracked files.
//!
//! One row per file, oldest first, with a size total at the bottom.

use crate::inventory::{StatusCounts, TrackedFile};
use crate::util::{format_age, format_bytes, format_date};

pub fn render(files: &[TrackedFile], now_ms: i64) -> String {
    if files.is_empty() {
        return String::from("No stale files tracked.\n");
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<30} {:>10} {:<11} {:<14} {:<9}\n",
        "NAME", "SIZE", "ADDED", "AGE", "STATUS"
    ));
    output.push_str(&"-".repeat(78));
    output.push('\n');

    let mut total: u64 = 0;
    for file in files {
        total = total.saturating_add(file.size);
        output.push_str(&format!(
            "{:<30} {:>10} {:<11} {:<14} {:<9}\n",
            truncate(&file.name, 30),
            format_bytes(file.size),
            format_date(file.added_date),
            format_age(file.added_date, now_ms),
            file.status.as_str(),
        ));
    }

    output.push_str(&format!(
        "\n{:>41}\n",
        format!("{} files, {}", files.len(), format_bytes(total))
    ));

    output
}

pub fn render_counts(counts: &StatusCounts) -> String {
    format!(
        "pending:  {}\narchived: {}\nignored:  {}\ntotal:    {}\n",
        counts.pending,
        counts.archived,
        counts.ignored,
        counts.total()
    )
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    #[test]
    fn empty_list_has_message() {
        assert_eq!(render(&[], 0), "No stale files tracked.\n");
    }

    #[test]
    fn rows_show_name_size_and_age() {
        let now = 400 * DAY_MS;
        let files = vec![TrackedFile::new("/d/a.txt", "a.txt", 2048, now - 200 * DAY_MS, "text/plain")];
        let out = render(&files, now);

        assert!(out.contains("a.txt"));
        assert!(out.contains("2.0 KB"));
        assert!(out.contains("200 days ago"));
        assert!(out.contains("PENDING"));
        assert!(out.contains("1 files, 2.0 KB"));
    }

    #[test]
    fn long_names_truncated() {
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("short", 8), "short");
    }
}
