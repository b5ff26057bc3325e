//! 7-day metabolic detox tracker
//!
//! Progress lives in the `detox` table as the current day plus a
//! comma-separated list of completed days. Everything here is pure
//! bookkeeping over that row.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::core::utils::{local_time, SQLITE_DATETIME};

/// Number of days in the program
pub const DETOX_DAYS: u8 = 7;

/// Daily program: (title, tasks)
const PROGRAM: [(&str, &[&str]); DETOX_DAYS as usize] = [
    (
        "Reset hydration",
        &[
            "Drink 500 ml of water within 30 minutes of waking",
            "Replace every sugary drink with water or herbal tea",
            "Aim for 35 ml of water per kg of body weight",
        ],
    ),
    (
        "Cut added sugar",
        &[
            "No added sugar or sweetened snacks today",
            "Read labels: skip anything with sugar in the first 3 ingredients",
            "Have a protein-rich breakfast to blunt cravings",
        ],
    ),
    (
        "Whole foods only",
        &[
            "No ultra-processed food today",
            "Fill half of each plate with vegetables",
            "Cook at least one meal from scratch",
        ],
    ),
    (
        "Glucose stability",
        &[
            "Eat vegetables and protein before carbs at every meal",
            "Take a 10-minute walk after your largest meal",
            "No snacking within 3 hours of bedtime",
        ],
    ),
    (
        "Gut support",
        &[
            "Add one fermented food (kefir, sauerkraut, kimchi)",
            "Get at least 30 g of fibre",
            "Eat slowly: put the fork down between bites",
        ],
    ),
    (
        "Sleep and recovery",
        &[
            "No caffeine after 12:00",
            "Screens off 60 minutes before bed",
            "Keep the bedroom cool and dark",
        ],
    ),
    (
        "Lock it in",
        &[
            "Repeat your favourite habit from this week",
            "Plan next week's meals around whole foods",
            "Write down how your energy changed since day 1",
        ],
    ),
];

/// Detox progress for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detox {
    pub user_id: i64,
    /// Current day, 1..=7
    pub day: u8,
    /// `datetime('now')` string from SQLite (UTC)
    pub started_at: String,
    /// Completed day numbers, sorted, unique
    pub completed: Vec<u8>,
}

/// Outcome of marking a day complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Day recorded, `next` is the new current day
    Advanced { next: u8 },
    /// The day was already complete, nothing changed
    AlreadyDone,
    /// All seven days are complete
    Finished,
    /// The day has not started yet in the user's calendar, nothing changed
    Locked { today: u8 },
}

impl Detox {
    /// Parses the stored `completed_days` column. Garbage and out-of-range
    /// entries are dropped.
    pub fn parse_completed(raw: &str) -> Vec<u8> {
        let mut days: Vec<u8> = raw
            .split(',')
            .filter_map(|part| part.trim().parse::<u8>().ok())
            .filter(|day| (1..=DETOX_DAYS).contains(day))
            .collect();
        days.sort_unstable();
        days.dedup();
        days
    }

    /// Serializes completed days for storage.
    pub fn completed_days_string(&self) -> String {
        self.completed
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_day_completed(&self, day: u8) -> bool {
        self.completed.contains(&day)
    }

    pub fn is_finished(&self) -> bool {
        self.completed.len() >= DETOX_DAYS as usize
    }

    /// Marks `day` complete and moves `self.day` to the next uncompleted day.
    pub fn complete_day(&mut self, day: u8) -> DayOutcome {
        let day = day.clamp(1, DETOX_DAYS);
        if self.is_day_completed(day) {
            return if self.is_finished() {
                DayOutcome::Finished
            } else {
                DayOutcome::AlreadyDone
            };
        }

        self.completed.push(day);
        self.completed.sort_unstable();

        if self.is_finished() {
            self.day = DETOX_DAYS;
            return DayOutcome::Finished;
        }

        let next = (1..=DETOX_DAYS)
            .find(|d| !self.is_day_completed(*d))
            .unwrap_or(DETOX_DAYS);
        self.day = next;
        DayOutcome::Advanced { next }
    }

    /// Like [`Detox::complete_day`], but only for days already unlocked at `now`.
    pub fn complete_unlocked_day(&mut self, day: u8, now: DateTime<Utc>, tz_offset: i64) -> DayOutcome {
        let today = self.current_day_by_calendar(now, tz_offset);
        if day > today {
            return DayOutcome::Locked { today };
        }
        self.complete_day(day)
    }

    /// Day index by elapsed local calendar days since the start, clamped to
    /// 1..=7. Both `started_at` (UTC) and `now` are shifted by `tz_offset`
    /// hours first. Falls back to the stored day when `started_at` does not parse.
    pub fn current_day_by_calendar(&self, now: DateTime<Utc>, tz_offset: i64) -> u8 {
        match NaiveDateTime::parse_from_str(&self.started_at, SQLITE_DATETIME) {
            Ok(started) => {
                let started = started + TimeDelta::hours(tz_offset);
                let elapsed = local_time(now, tz_offset)
                    .date()
                    .signed_duration_since(started.date())
                    .num_days();
                (elapsed + 1).clamp(1, DETOX_DAYS as i64) as u8
            }
            Err(_) => self.day,
        }
    }

    /// Days unlock one per local calendar day.
    pub fn is_unlocked(&self, day: u8, now: DateTime<Utc>, tz_offset: i64) -> bool {
        day <= self.current_day_by_calendar(now, tz_offset)
    }

    /// Day shown by `/detox` and the morning reminder: the earliest unlocked
    /// day not yet done, or today's calendar day when all unlocked days are done.
    pub fn day_to_show(&self, now: DateTime<Utc>, tz_offset: i64) -> u8 {
        let today = self.current_day_by_calendar(now, tz_offset);
        (1..=today).find(|d| !self.is_day_completed(*d)).unwrap_or(today)
    }

    /// `✅✅⬜⬜⬜⬜⬜`
    pub fn progress_bar(&self) -> String {
        (1..=DETOX_DAYS)
            .map(|d| if self.is_day_completed(d) { '✅' } else { '⬜' })
            .collect()
    }
}

pub fn day_title(day: u8) -> &'static str {
    PROGRAM[(day.clamp(1, DETOX_DAYS) - 1) as usize].0
}

pub fn day_tasks(day: u8) -> &'static [&'static str] {
    PROGRAM[(day.clamp(1, DETOX_DAYS) - 1) as usize].1
}

/// Plain-text card for a day of the program.
pub fn format_day(detox: &Detox, day: u8) -> String {
    let mut text = format!(
        "🌿 7-Day Detox — Day {}/{}: {}\n{}\n\n",
        day,
        DETOX_DAYS,
        day_title(day),
        detox.progress_bar()
    );
    for task in day_tasks(day) {
        text.push_str("• ");
        text.push_str(task);
        text.push('\n');
    }
    if detox.is_day_completed(day) {
        text.push_str("\n✅ Done for today.");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fresh() -> Detox {
        Detox {
            user_id: 1,
            day: 1,
            started_at: "2026-03-01 08:00:00".to_string(),
            completed: Vec::new(),
        }
    }

    #[test]
    fn parse_completed_tolerates_garbage() {
        assert_eq!(Detox::parse_completed(""), Vec::<u8>::new());
        assert_eq!(Detox::parse_completed("3,1,x,9,1, 2"), vec![1, 2, 3]);
    }

    #[test]
    fn completed_days_string_roundtrips_storage_format() {
        let mut detox = fresh();
        detox.complete_day(2);
        detox.complete_day(1);
        assert_eq!(detox.completed_days_string(), "1,2");
    }

    #[test]
    fn complete_day_is_idempotent() {
        let mut detox = fresh();
        assert_eq!(detox.complete_day(1), DayOutcome::Advanced { next: 2 });
        assert_eq!(detox.complete_day(1), DayOutcome::AlreadyDone);
        assert_eq!(detox.completed, vec![1]);
        assert_eq!(detox.day, 2);
    }

    #[test]
    fn finishes_after_seven_distinct_days() {
        let mut detox = fresh();
        for day in 1..DETOX_DAYS {
            assert!(matches!(detox.complete_day(day), DayOutcome::Advanced { .. }));
        }
        assert!(!detox.is_finished());
        assert_eq!(detox.complete_day(DETOX_DAYS), DayOutcome::Finished);
        assert!(detox.is_finished());
        assert_eq!(detox.complete_day(3), DayOutcome::Finished);
    }

    #[test]
    fn skipped_day_becomes_next_current_day() {
        let mut detox = fresh();
        detox.complete_day(1);
        detox.complete_day(3);
        assert_eq!(detox.day, 2);
    }

    #[test]
    fn calendar_day_is_clamped() {
        let detox = fresh();
        let same_day = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let third_day = Utc.with_ymd_and_hms(2026, 3, 3, 1, 0, 0).unwrap();
        let much_later = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(detox.current_day_by_calendar(same_day, 0), 1);
        assert_eq!(detox.current_day_by_calendar(third_day, 0), 3);
        assert_eq!(detox.current_day_by_calendar(much_later, 0), 7);
    }

    #[test]
    fn calendar_day_uses_local_date_east_of_utc() {
        let detox = Detox {
            started_at: "2026-05-01 00:30:00".to_string(),
            ..fresh()
        };
        // 23:00 UTC on May 1 is 09:00 on May 2 at UTC+10
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 23, 0, 0).unwrap();
        assert_eq!(detox.current_day_by_calendar(now, 10), 2);
        assert_eq!(detox.current_day_by_calendar(now, 0), 1);
    }

    #[test]
    fn calendar_day_uses_local_date_west_of_utc() {
        // Started 20:00 on May 1 local time at UTC-5
        let detox = Detox {
            started_at: "2026-05-02 01:00:00".to_string(),
            ..fresh()
        };
        // 02:00 UTC on May 3 is 21:00 on May 2 local: still day 2
        let now = Utc.with_ymd_and_hms(2026, 5, 3, 2, 0, 0).unwrap();
        assert_eq!(detox.current_day_by_calendar(now, -5), 2);
        assert_eq!(detox.current_day_by_calendar(now, 0), 2);
        let next_morning = Utc.with_ymd_and_hms(2026, 5, 3, 14, 0, 0).unwrap();
        assert_eq!(detox.current_day_by_calendar(next_morning, -5), 3);
    }

    #[test]
    fn days_unlock_one_per_calendar_day() {
        let detox = fresh();
        let second_day = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert!(detox.is_unlocked(1, second_day, 0));
        assert!(detox.is_unlocked(2, second_day, 0));
        assert!(!detox.is_unlocked(3, second_day, 0));
    }

    #[test]
    fn future_days_cannot_be_completed() {
        let mut detox = fresh();
        let first_day = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(detox.complete_unlocked_day(1, first_day, 0), DayOutcome::Advanced { next: 2 });
        assert_eq!(detox.complete_unlocked_day(2, first_day, 0), DayOutcome::Locked { today: 1 });
        assert_eq!(detox.completed, vec![1]);
        assert_eq!(detox.day, 2);

        // 20:00 UTC on March 1 is already March 2 at UTC+5
        assert_eq!(detox.complete_unlocked_day(2, first_day, 5), DayOutcome::Advanced { next: 3 });
    }

    #[test]
    fn day_to_show_prefers_missed_days() {
        let mut detox = fresh();
        let fourth_day = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(detox.day_to_show(fourth_day, 0), 1);

        detox.complete_day(1);
        detox.complete_day(2);
        assert_eq!(detox.day_to_show(fourth_day, 0), 3);

        detox.complete_day(3);
        detox.complete_day(4);
        assert_eq!(detox.day_to_show(fourth_day, 0), 4);
    }

    #[test]
    fn progress_bar_marks_completed_days() {
        let mut detox = fresh();
        detox.complete_day(1);
        detox.complete_day(2);
        assert_eq!(detox.progress_bar(), "✅✅⬜⬜⬜⬜⬜");
    }

    #[test]
    fn format_day_lists_tasks() {
        let detox = fresh();
        let card = format_day(&detox, 2);
        assert!(card.contains("Day 2/7: Cut added sugar"));
        assert_eq!(card.matches("• ").count(), day_tasks(2).len());
    }
}
