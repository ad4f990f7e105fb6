//! Append-only CSV history log

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use csv::StringRecord;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{EntryKind, LogEntry};

use super::lock::{HistoryLock, LockMode};

/// Header row of the log. Field order and casing are relied on by operators.
pub const HEADER: [&str; 4] = ["timestamp", "type", "level", "sent"];

/// A parsed row together with the exact fields it was read from
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub record: StringRecord,
    pub entry: LogEntry,
}

/// The durable log of readings and notifications.
///
/// Appends never take the retention lock; each append is one `write_all` on
/// a file opened in append mode, so readers see either the whole row or none
/// of it.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling lock file used by pruning
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Append one entry, writing the header first if the file is new
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Append `entries` with a single write, so either every row lands or
    /// none does. An empty slice leaves the file untouched.
    pub fn append_all(&self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            writer.write_record(HEADER)?;
        }
        for entry in entries {
            writer.write_record([
                entry.timestamp_field().as_str(),
                entry.kind.as_str(),
                entry.level_field().as_str(),
                entry.sent_field(),
            ])?;
        }
        let buf = writer.into_inner().map_err(|e| e.into_error())?;

        file.write_all(&buf)?;

        for entry in entries {
            debug!(
                path = %self.path.display(),
                kind = %entry.kind,
                level = entry.level,
                sent = entry.sent,
                "Appended history entry"
            );
        }
        Ok(())
    }

    /// All entries in on-disk order. A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<LogEntry>> {
        Ok(self.read_rows()?.into_iter().map(|r| r.entry).collect())
    }

    /// Entries with `timestamp >= cutoff`, in on-disk order
    pub fn read_since<Tz: TimeZone>(&self, cutoff: &DateTime<Tz>) -> Result<Vec<LogEntry>> {
        let cutoff = cutoff.with_timezone(&Utc);
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.timestamp.with_timezone(&Utc) >= cutoff)
            .collect())
    }

    /// Prepend the header to a legacy headerless log.
    ///
    /// Returns `true` if the file was rewritten. Skips the repair when a
    /// prune currently holds the lock; reads tolerate a missing header.
    pub fn ensure_header(&self) -> Result<bool> {
        let mut first = String::new();
        match File::open(&self.path) {
            Ok(file) => BufReader::new(file).read_line(&mut first)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let first = first.trim();
        if first.is_empty() || first == HEADER.join(",") {
            return Ok(false);
        }

        let _lock = match HistoryLock::acquire(&self.lock_path(), LockMode::FailFast) {
            Ok(lock) => lock,
            Err(e) if e.is_lock_contention() => {
                debug!("History lock held, deferring header repair");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let rows = self.read_rows()?;
        self.stage(rows.iter().map(|r| &r.record))?.commit()?;

        info!(path = %self.path.display(), rows = rows.len(), "Added missing header to history log");
        Ok(true)
    }

    /// Parse every row, keeping the raw record for verbatim rewrites
    pub(crate) fn read_rows(&self) -> Result<Vec<StoredRow>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if index == 0 && is_header(&record) {
                continue;
            }
            let line = record.position().map_or(index as u64 + 1, |p| p.line());
            let entry = parse_record(&record, line)?;
            rows.push(StoredRow { record, entry });
        }

        Ok(rows)
    }

    /// Write header plus `records` to a synced temp file next to the log.
    ///
    /// Nothing is visible at the log path until [`StagedRewrite::commit`].
    pub(crate) fn stage<'a>(
        &self,
        records: impl IntoIterator<Item = &'a StringRecord>,
    ) -> Result<StagedRewrite> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".litteralert-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(HEADER)?;
            for record in records {
                writer.write_record(record)?;
            }
            writer.flush()?;
        }

        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), metadata.permissions())?;
        }
        tmp.as_file().sync_all()?;

        Ok(StagedRewrite {
            tmp,
            target: self.path.clone(),
        })
    }
}

/// A fully written replacement log waiting to be renamed into place.
///
/// Dropping it without committing removes the temp file and leaves the
/// original log untouched.
#[derive(Debug)]
pub struct StagedRewrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedRewrite {
    /// Path of the staged temp file
    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    /// Atomically rename the staged file over the log
    pub fn commit(self) -> Result<()> {
        self.tmp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

fn is_header(record: &StringRecord) -> bool {
    record.iter().map(str::trim).eq(HEADER.iter().copied())
}

fn parse_record(record: &StringRecord, line: u64) -> Result<LogEntry> {
    if record.len() != HEADER.len() {
        return Err(Error::format(
            line,
            format!("expected {} fields, found {}", HEADER.len(), record.len()),
        ));
    }

    let timestamp = DateTime::parse_from_rfc3339(record[0].trim())
        .map_err(|e| Error::format(line, format!("bad timestamp '{}': {e}", &record[0])))?;
    let kind: EntryKind = record[1]
        .trim()
        .parse()
        .map_err(|e: String| Error::format(line, e))?;
    let level: f64 = record[2]
        .trim()
        .parse()
        .map_err(|e| Error::format(line, format!("bad level '{}': {e}", &record[2])))?;
    let sent = match record[3].trim() {
        "True" => true,
        "False" => false,
        other => {
            return Err(Error::format(
                line,
                format!("bad sent flag '{other}', expected True or False"),
            ))
        }
    };

    Ok(LogEntry::new(timestamp, kind, level, sent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};
    use pretty_assertions::assert_eq;

    fn central() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        central().with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join("litter_log.csv"))
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.read_all().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .append(&LogEntry::new(at(9, 0), EntryKind::Container, 72.0, true))
            .unwrap();
        store
            .append(&LogEntry::new(at(9, 15), EntryKind::Litter, 55.54, false))
            .unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            contents,
            "timestamp,type,level,sent\n\
             2024-05-01T09:00:00.000000-05:00,container,72.0,True\n\
             2024-05-01T09:15:00.000000-05:00,litter,55.5,False\n"
        );
    }

    #[test]
    fn test_append_all_writes_rows_together() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append_all(&[]).unwrap();
        assert!(!store.path().exists());

        store
            .append_all(&[
                LogEntry::new(at(9, 0), EntryKind::Container, 95.0, true),
                LogEntry::new(at(9, 0), EntryKind::Litter, 10.0, true),
            ])
            .unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            contents,
            "timestamp,type,level,sent\n\
             2024-05-01T09:00:00.000000-05:00,container,95.0,True\n\
             2024-05-01T09:00:00.000000-05:00,litter,10.0,True\n"
        );
    }

    #[test]
    fn test_append_all_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("missing").join("log.csv"));

        let result = store.append_all(&[LogEntry::new(at(9, 0), EntryKind::Container, 95.0, true)]);

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_read_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        // Out-of-order timestamps must not be sorted on read
        let entries = vec![
            LogEntry::new(at(10, 0), EntryKind::Container, 10.0, false),
            LogEntry::new(at(9, 0), EntryKind::Litter, 80.0, false),
            LogEntry::new(at(11, 0), EntryKind::Morning, 12.0, true),
        ];
        for entry in &entries {
            store.append(entry).unwrap();
        }

        assert_eq!(store.read_all().unwrap(), entries);
    }

    #[test]
    fn test_read_since_filters_inclusively() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for (hour, level) in [(7, 1.0), (8, 2.0), (9, 3.0)] {
            store
                .append(&LogEntry::new(at(hour, 0), EntryKind::Container, level, false))
                .unwrap();
        }

        let since = store.read_since(&at(8, 0)).unwrap();
        let levels: Vec<f64> = since.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![2.0, 3.0]);

        // Same instant expressed in UTC
        let since_utc = store
            .read_since(&(at(8, 0) + Duration::minutes(1)).with_timezone(&Utc))
            .unwrap();
        assert_eq!(since_utc.len(), 1);
    }

    #[test]
    fn test_reads_python_isoformat_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            "timestamp,type,level,sent\n\
             2024-05-01T09:00:00.123456-05:00,container,91.0,True\n\
             2024-05-01T09:30:00-05:00,litter,18.2,False\n",
        )
        .unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].sent);
        assert_eq!(entries[1].kind, EntryKind::Litter);
        assert_eq!(entries[1].level, 18.2);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            "timestamp,type,level,sent\n\
             2024-05-01T09:00:00-05:00,container,91.0,True\n\
             2024-05-01T09:30:00-05:00,litter,18.2,yes\n",
        )
        .unwrap();

        match store.read_all() {
            Err(Error::Format { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_header_repairs_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let legacy = "2024-05-01T09:00:00-05:00,container,91.0,True\n";
        fs::write(store.path(), legacy).unwrap();

        // Headerless files are readable before the repair
        assert_eq!(store.read_all().unwrap().len(), 1);

        assert!(store.ensure_header().unwrap());
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            format!("timestamp,type,level,sent\n{legacy}")
        );
        assert!(!store.ensure_header().unwrap());
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_dropped_stage_leaves_original_intact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .append(&LogEntry::new(at(9, 0), EntryKind::Container, 50.0, false))
            .unwrap();
        let before = fs::read(store.path()).unwrap();

        let staged = store.stage(std::iter::empty()).unwrap();
        let tmp_path = staged.path().to_path_buf();
        assert!(tmp_path.exists());
        drop(staged);

        assert!(!tmp_path.exists());
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_lock_path_is_sibling() {
        let store = HistoryStore::new("/var/lib/litteralert/litter_log.csv");
        assert_eq!(
            store.lock_path(),
            PathBuf::from("/var/lib/litteralert/litter_log.csv.lock")
        );
    }
}
