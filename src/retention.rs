use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What a retention sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Parse the date embedded in a `{YYYY-MM-DD}_{base}.json` file name.
///
/// Returns `None` for names that belong to another base or whose prefix is
/// not a valid date.
pub fn parse_log_date(file_name: &str, base_filename: &str) -> Option<NaiveDate> {
    let suffix = format!("_{base_filename}.json");
    if !file_name.ends_with(&suffix) {
        return None;
    }
    let (date_str, _) = file_name.split_once('_')?;
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

/// Keep the newest `storage_days` dated log files in `dir` and delete the rest.
///
/// `active` is the day currently being written; it counts toward the kept
/// files even before its file exists. A non-positive `storage_days`
/// disables deletion.
pub fn sweep(
    dir: &Path,
    base_filename: &str,
    storage_days: i64,
    active: Option<NaiveDate>,
) -> RetentionReport {
    let mut report = RetentionReport::default();
    if storage_days <= 0 {
        return report;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return report,
    };

    let mut logs: Vec<(NaiveDate, Option<PathBuf>)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let date = parse_log_date(name.to_str()?, base_filename)?;
            Some((date, Some(entry.path())))
        })
        .collect();

    if let Some(active) = active {
        if !logs.iter().any(|(date, _)| *date == active) {
            logs.push((active, None));
        }
    }

    logs.sort_by(|a, b| a.0.cmp(&b.0));

    let keep = usize::try_from(storage_days).unwrap_or(usize::MAX);
    let excess = logs.len().saturating_sub(keep);

    for (_, path) in logs.into_iter().take(excess) {
        let Some(path) = path else { continue };
        match std::fs::remove_file(&path) {
            Ok(()) => report.deleted.push(path),
            Err(e) => {
                warn!(
                    target: crate::INTERNAL_TARGET,
                    path = %path.display(),
                    error = %e,
                    "failed to remove old log file"
                );
                report.failed.push(path);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "{}\n").unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_only_matching_names() {
        assert_eq!(parse_log_date("2024-05-01_app.json", "app"), Some(date(2024, 5, 1)));
        assert_eq!(parse_log_date("2024-05-01_my_app.json", "my_app"), Some(date(2024, 5, 1)));
        assert_eq!(parse_log_date("2024-05-01_other.json", "app"), None);
        assert_eq!(parse_log_date("latest_app.json", "app"), None);
        assert_eq!(parse_log_date("2024-13-01_app.json", "app"), None);
    }

    #[test]
    fn keeps_newest_files_and_deletes_the_rest() {
        let tmp = TempDir::new().unwrap();
        for day in 1..=5 {
            touch(tmp.path(), &format!("2024-05-0{day}_app.json"));
        }

        let report = sweep(tmp.path(), "app", 2, None);

        assert_eq!(report.deleted.len(), 3);
        assert!(report.failed.is_empty());
        for day in 1..=3 {
            assert!(!tmp.path().join(format!("2024-05-0{day}_app.json")).exists());
        }
        assert!(tmp.path().join("2024-05-04_app.json").exists());
        assert!(tmp.path().join("2024-05-05_app.json").exists());
    }

    #[test]
    fn sorts_by_embedded_date_not_name() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "2023-12-31_app.json");
        touch(tmp.path(), "2024-01-01_app.json");

        sweep(tmp.path(), "app", 1, None);

        assert!(!tmp.path().join("2023-12-31_app.json").exists());
        assert!(tmp.path().join("2024-01-01_app.json").exists());
    }

    #[test]
    fn non_positive_storage_days_disables_cleanup() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "2024-05-01_app.json");
        touch(tmp.path(), "2024-05-02_app.json");

        assert_eq!(sweep(tmp.path(), "app", 0, None), RetentionReport::default());
        assert_eq!(sweep(tmp.path(), "app", -3, None), RetentionReport::default());
        assert!(tmp.path().join("2024-05-01_app.json").exists());
    }

    #[test]
    fn unparseable_and_foreign_files_are_untouched() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "2024-05-01_app.json");
        touch(tmp.path(), "2024-05-02_app.json");
        touch(tmp.path(), "notes_app.json");
        touch(tmp.path(), "2024-04-01_other.json");
        touch(tmp.path(), "2024-04-01_app.txt");

        let report = sweep(tmp.path(), "app", 1, None);

        assert_eq!(report.deleted, vec![tmp.path().join("2024-05-01_app.json")]);
        assert!(tmp.path().join("notes_app.json").exists());
        assert!(tmp.path().join("2024-04-01_other.json").exists());
        assert!(tmp.path().join("2024-04-01_app.txt").exists());
    }

    #[test]
    fn active_day_counts_before_its_file_exists() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "2024-05-01_app.json");
        touch(tmp.path(), "2024-05-02_app.json");

        let report = sweep(tmp.path(), "app", 2, Some(date(2024, 5, 3)));

        assert_eq!(report.deleted, vec![tmp.path().join("2024-05-01_app.json")]);
        assert!(tmp.path().join("2024-05-02_app.json").exists());
    }

    #[test]
    fn failed_delete_is_reported_and_sweep_continues() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("2024-05-01_app.json")).unwrap();
        touch(tmp.path(), "2024-05-02_app.json");
        touch(tmp.path(), "2024-05-03_app.json");

        let report = sweep(tmp.path(), "app", 1, None);

        assert_eq!(report.failed, vec![tmp.path().join("2024-05-01_app.json")]);
        assert_eq!(report.deleted, vec![tmp.path().join("2024-05-02_app.json")]);
        assert!(tmp.path().join("2024-05-03_app.json").exists());
    }

    #[test]
    fn missing_directory_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let report = sweep(&tmp.path().join("absent"), "app", 1, None);
        assert_eq!(report, RetentionReport::default());
    }
}
