//! Slot generation
//!
//! Enumerates every slot on the working calendar: each day in the configured ranges
//! whose weekday is a working day, each working-hours interval of that day, one slot
//! every `60 / appointments_per_hour` minutes.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::{debug, instrument};

use super::Slot;
use crate::types::{pad_width, SlotId, ValidatedConfig};

/// Generate the full slot table in chronological order.
///
/// An empty `working_days` set yields an empty table.
#[instrument(skip(config), fields(ranges = config.date_ranges.len()))]
pub fn generate_slots(config: &ValidatedConfig) -> Vec<Slot> {
    let step = config.slot_duration_min();
    let mut grid = Vec::new();

    for (range_start, range_end) in &config.date_ranges {
        let mut day = range_start.date();
        while day <= range_end.date() {
            if config
                .working_days
                .contains(&day.weekday().num_days_from_monday())
            {
                for time in day_grid(&config.working_hours, step) {
                    let at = day.and_time(time);
                    if *range_start <= at && at <= *range_end {
                        grid.push((day, time));
                    }
                }
            }
            day += Duration::days(1);
        }
    }

    let width = pad_width(grid.len());
    let slots: Vec<Slot> = grid
        .into_iter()
        .enumerate()
        .map(|(i, (date, time))| Slot::new(SlotId::from_sequence(i + 1, width), date, time))
        .collect();

    debug!(slots = slots.len(), step_minutes = step, "Generated slot grid");
    slots
}

/// Slot start times within one working day
fn day_grid(working_hours: &[(u32, u32)], step_minutes: u32) -> Vec<NaiveTime> {
    working_hours
        .iter()
        .flat_map(|(start, end)| (start * 60..end * 60).step_by(step_minutes.max(1) as usize))
        .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
        .collect()
}

/// Number of working days between two dates, inclusive
pub fn count_working_days(start: NaiveDate, end: NaiveDate, working_days: &[u32]) -> usize {
    let mut day = start;
    let mut count = 0;
    while day <= end {
        if working_days.contains(&day.weekday().num_days_from_monday()) {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}
