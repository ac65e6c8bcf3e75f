use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use url::Url;

use crate::config::Show;

use super::{Episode, Window};

/// Extra time recorded after the scheduled end, for shows that over-run
pub const RECORDING_MARGIN: TimeDelta = TimeDelta::minutes(3);

/// Lazy walk over a show's cron schedule inside a window
///
/// Each call to `next` computes a single schedule step, so an old `since`
/// does not materialize years of episodes up front.
pub struct ScheduledEpisodes<F> {
    show_id: String,
    station: String,
    schedule: Schedule,
    duration: TimeDelta,
    cursor: DateTime<Tz>,
    until: DateTime<Utc>,
    locate: F,
    done: bool,
}

impl<F> ScheduledEpisodes<F>
where
    F: Fn(&DateTime<Tz>) -> Url,
{
    /// `locate` maps a local start time to the episode's remote locator
    pub fn new(show: &Show, window: Window, locate: F) -> Self {
        // The schedule yields instants strictly after the cursor; stepping
        // one second back makes `since` itself eligible.
        let cursor = (window.since - TimeDelta::seconds(1)).with_timezone(&show.timezone);

        Self {
            show_id: show.id.clone(),
            station: show.station.clone(),
            schedule: show.schedule.clone(),
            duration: show.duration + RECORDING_MARGIN,
            cursor,
            until: window.until,
            locate,
            done: false,
        }
    }
}

impl<F> Iterator for ScheduledEpisodes<F>
where
    F: Fn(&DateTime<Tz>) -> Url,
{
    type Item = Episode;

    fn next(&mut self) -> Option<Episode> {
        if self.done {
            return None;
        }

        let Some(start) = self.schedule.after(&self.cursor).next() else {
            self.done = true;
            return None;
        };

        if start.with_timezone(&Utc) >= self.until {
            self.done = true;
            return None;
        }

        self.cursor = start;

        Some(Episode {
            show_id: self.show_id.clone(),
            station: self.station.clone(),
            recorded_at: start.fixed_offset(),
            duration: self.duration,
            locator: (self.locate)(&start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use chrono::TimeZone;
    use std::path::Path;

    fn make_show(cron: &str, timezone: &str) -> Show {
        let yaml = format!(
            "morning-show:\n  name: Morning Show\n  station: nacional870\n  cron: \"{cron}\"\n  timezone: {timezone}\n  duration: 3600\n"
        );
        parse_config(&yaml, Path::new("test.yaml"))
            .unwrap()
            .remove(0)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn locate(start: &DateTime<Tz>) -> Url {
        Url::parse(&format!("https://example.com/{}", start.timestamp())).unwrap()
    }

    #[test]
    fn yields_occurrences_inside_window() {
        let show = make_show("0 9 * * *", "UTC");
        let window = Window::new(utc(2024, 1, 1, 0), utc(2024, 1, 4, 0));

        let starts: Vec<_> = ScheduledEpisodes::new(&show, window, locate)
            .map(|e| e.starts_at())
            .collect();

        assert_eq!(
            starts,
            vec![utc(2024, 1, 1, 9), utc(2024, 1, 2, 9), utc(2024, 1, 3, 9)]
        );
    }

    #[test]
    fn since_is_inclusive_until_is_exclusive() {
        let show = make_show("0 9 * * *", "UTC");
        let window = Window::new(utc(2024, 1, 1, 9), utc(2024, 1, 3, 9));

        let starts: Vec<_> = ScheduledEpisodes::new(&show, window, locate)
            .map(|e| e.starts_at())
            .collect();

        assert_eq!(starts, vec![utc(2024, 1, 1, 9), utc(2024, 1, 2, 9)]);
    }

    #[test]
    fn schedule_runs_in_show_timezone() {
        let show = make_show("0 9 * * *", "America/Argentina/Buenos_Aires");
        let window = Window::new(utc(2024, 1, 2, 0), utc(2024, 1, 3, 0));

        let episodes: Vec<_> = ScheduledEpisodes::new(&show, window, locate).collect();

        assert_eq!(episodes.len(), 1);
        // 09:00 at UTC-3
        assert_eq!(episodes[0].starts_at(), utc(2024, 1, 2, 12));
        assert_eq!(episodes[0].id(), "morning-show_2024-01-02_0900");
    }

    #[test]
    fn episodes_carry_margin_and_locator() {
        let show = make_show("0 9 * * *", "UTC");
        let window = Window::new(utc(2024, 1, 2, 0), utc(2024, 1, 3, 0));

        let episode = ScheduledEpisodes::new(&show, window, locate).next().unwrap();

        assert_eq!(episode.duration, TimeDelta::hours(1) + RECORDING_MARGIN);
        assert_eq!(episode.station, "nacional870");
        assert_eq!(episode.locator.as_str(), "https://example.com/1704186000");
    }

    #[test]
    fn weekday_filter_skips_weekend() {
        // 2024-01-05 is a Friday
        let show = make_show("0 9 * * Mon-Fri", "UTC");
        let window = Window::new(utc(2024, 1, 5, 0), utc(2024, 1, 9, 0));

        let starts: Vec<_> = ScheduledEpisodes::new(&show, window, locate)
            .map(|e| e.starts_at())
            .collect();

        assert_eq!(
            starts,
            vec![utc(2024, 1, 5, 9), utc(2024, 1, 8, 9)]
        );
    }

    #[test]
    fn empty_window_yields_nothing() {
        let show = make_show("0 9 * * *", "UTC");
        let window = Window::new(utc(2024, 1, 2, 10), utc(2024, 1, 2, 10));

        assert_eq!(ScheduledEpisodes::new(&show, window, locate).count(), 0);
    }
}
