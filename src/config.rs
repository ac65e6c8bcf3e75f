use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::TimeDelta;
use chrono_tz::Tz;
use cron::Schedule;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// A recurring radio show tracked for syncing
#[derive(Debug, Clone)]
pub struct Show {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Station slug on the remote service
    pub station: String,
    /// Cron expression as written in the config, kept for display
    pub cron: String,
    pub schedule: Schedule,
    /// Timezone the schedule is evaluated in
    pub timezone: Tz,
    /// Regular on-air length of one episode
    pub duration: TimeDelta,
    pub image_url: Option<Url>,
}

/// One show entry as it appears in the YAML file
#[derive(Debug, Deserialize)]
struct ShowEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    station: String,
    cron: String,
    timezone: String,
    /// Seconds
    duration: i64,
    #[serde(default)]
    image_url: Option<Url>,
}

/// Load and validate the show configuration file
///
/// Shows are returned sorted by id.
pub fn load_config(path: &Path) -> Result<Vec<Show>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_config(&text, path)
}

/// Parse and validate configuration text; `origin` is used for error messages
pub fn parse_config(text: &str, origin: &Path) -> Result<Vec<Show>, ConfigError> {
    let entries: BTreeMap<String, ShowEntry> =
        serde_yaml::from_str(text).map_err(|e| ConfigError::ParseFailed {
            path: origin.to_path_buf(),
            source: e,
        })?;

    if entries.is_empty() {
        return Err(ConfigError::NoShows(origin.to_path_buf()));
    }

    entries
        .into_iter()
        .map(|(id, entry)| build_show(id, entry))
        .collect()
}

fn build_show(id: String, entry: ShowEntry) -> Result<Show, ConfigError> {
    if !is_valid_show_id(&id) {
        return Err(ConfigError::InvalidShowId(id));
    }

    let schedule = parse_schedule(&entry.cron).map_err(|e| ConfigError::InvalidCron {
        show_id: id.clone(),
        expression: entry.cron.clone(),
        reason: e.to_string(),
    })?;

    let timezone = Tz::from_str(&entry.timezone).map_err(|_| ConfigError::InvalidTimezone {
        show_id: id.clone(),
        timezone: entry.timezone.clone(),
    })?;

    if entry.duration <= 0 {
        return Err(ConfigError::InvalidDuration(id));
    }

    Ok(Show {
        id,
        name: entry.name,
        description: entry.description.filter(|d| !d.trim().is_empty()),
        station: entry.station,
        cron: entry.cron,
        schedule,
        timezone,
        duration: TimeDelta::seconds(entry.duration),
        image_url: entry.image_url,
    })
}

/// Show ids end up in file names, so they are kept to a safe alphabet
fn is_valid_show_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

/// Parse a cron expression, accepting the classic five-field crontab form
///
/// Five fields are minute first with crontab day numbering (0 or 7 is
/// Sunday); the seconds field is pinned to zero and numeric days are
/// rewritten as names. Six and seven fields use the `cron` crate syntax.
pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day, month, weekday] => Schedule::from_str(&format!(
            "0 {minute} {hour} {day} {month} {}",
            crontab_weekdays(weekday)
        )),
        _ => Schedule::from_str(expression.trim()),
    }
}

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Rewrite a crontab day-of-week field into day names
fn crontab_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(crontab_weekday_item)
        .collect::<Vec<_>>()
        .join(",")
}

/// One list item: `*`, `N`, `N-M`, optionally with `/step`. Anything else
/// (names, `?`, out of range numbers) is passed through for `cron` to judge.
fn crontab_weekday_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => match step.parse::<usize>() {
            Ok(step) if step > 0 => (range, step),
            _ => return item.to_string(),
        },
        None => (item, 1),
    };

    if range == "*" && step == 1 {
        return item.to_string();
    }

    let bounds: Option<(usize, usize)> = match range {
        "*" => Some((0, 6)),
        _ => match range.split_once('-') {
            Some((first, last)) => first.parse().ok().zip(last.parse().ok()),
            // "N/step" runs from N to the end of the week
            None => range
                .parse()
                .ok()
                .map(|day| if step > 1 { (day, 6) } else { (day, day) }),
        },
    };

    let Some((first, last)) = bounds.filter(|&(first, last)| first <= last && last <= 7) else {
        return item.to_string();
    };

    let mut selected = [false; 7];
    for day in (first..=last).step_by(step) {
        selected[day % 7] = true;
    }

    DAY_NAMES
        .iter()
        .zip(selected)
        .filter(|(_, on)| *on)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(",")
}
