use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::HistoryError;

const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Naive layouts accepted when reading a history file, interpreted as UTC
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// The persisted "fetched everything up to here" instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(DateTime<Utc>);

impl Checkpoint {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Midnight UTC of the given day
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Move forward to `to`; never moves backwards
    pub fn advance(self, to: DateTime<Utc>) -> Self {
        Self(self.0.max(to))
    }

    /// Parse a date, a naive date-time (UTC) or an RFC 3339 timestamp
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self(dt.with_timezone(&Utc)));
        }

        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(Self(dt.and_utc()));
            }
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(Self::from_date)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WRITE_FORMAT))
    }
}

/// Read the checkpoint stored at `path`
pub fn load_history(path: &Path) -> Result<Checkpoint, HistoryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HistoryError::Missing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(HistoryError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    Checkpoint::parse(&content).ok_or_else(|| HistoryError::InvalidTimestamp {
        path: path.to_path_buf(),
        value: content.trim().to_string(),
    })
}

/// Atomically replace the checkpoint stored at `path`
///
/// The value is written to a sibling `.temp` file, flushed to disk and then
/// renamed over the old file, so a crash leaves either the old or the new
/// checkpoint in place.
pub fn save_history(path: &Path, checkpoint: Checkpoint) -> Result<(), HistoryError> {
    let temp_path = temp_path_for(path);
    let write_failed = |source| HistoryError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::create(&temp_path).map_err(write_failed)?;
    writeln!(file, "{checkpoint}").map_err(write_failed)?;
    file.sync_all().map_err(write_failed)?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        write_failed(e)
    })
}

/// Where a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    /// The checkpoint stored by a previous run
    Checkpoint(Checkpoint),
    /// A day given by the user, starting at midnight in each show's timezone
    Date(NaiveDate),
}

impl StartPoint {
    /// The instant this start point denotes for a show in `timezone`
    pub fn at_in(&self, timezone: Tz) -> DateTime<Utc> {
        match self {
            Self::Checkpoint(checkpoint) => checkpoint.at(),
            Self::Date(date) => local_midnight(*date, timezone),
        }
    }

    /// The earliest instant over `timezones`, as a checkpoint
    pub fn earliest<I>(&self, timezones: I) -> Checkpoint
    where
        I: IntoIterator<Item = Tz>,
    {
        match self {
            Self::Checkpoint(checkpoint) => *checkpoint,
            Self::Date(date) => timezones
                .into_iter()
                .map(|tz| Checkpoint::new(self.at_in(tz)))
                .min()
                .unwrap_or_else(|| Checkpoint::from_date(*date)),
        }
    }
}

/// First instant of `date` in `timezone`; days starting inside a DST gap
/// begin at the first valid local time
fn local_midnight(date: NaiveDate, timezone: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..24)
        .find_map(|hour| {
            timezone
                .from_local_datetime(&(midnight + TimeDelta::hours(hour)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Decide where this run starts, before anything is fetched
///
/// An explicit start and an existing history file are mutually exclusive;
/// without an explicit start the history file must exist.
pub fn resolve_start(
    path: &Path,
    explicit_start: Option<NaiveDate>,
) -> Result<StartPoint, HistoryError> {
    match explicit_start {
        Some(_) if path.exists() => Err(HistoryError::Conflict(path.to_path_buf())),
        Some(date) => Ok(StartPoint::Date(date)),
        None => load_history(path).map(StartPoint::Checkpoint),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".temp");
    PathBuf::from(name)
}
