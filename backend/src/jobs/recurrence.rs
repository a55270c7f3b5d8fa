// Recurrence arithmetic for contract work generation.
//
// Everything in this module is pure: identical inputs always produce the same
// next due date, which is what lets the duplicate check in work_generation
// reason about "the occurrence for this day" deterministically.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};

use fieldops_shared::{Contract, RecurrenceUnit};

/// Compute the next date this contract's recurring work comes due.
///
/// Based off the generation cursor when one exists; otherwise the contract's
/// start date is itself the first occurrence (no interval added), and a
/// contract with neither bases off `now`. Returns `None` for contracts
/// without a usable recurrence rule.
pub fn next_due_date(contract: &Contract, now: DateTime<Utc>) -> Option<NaiveDate> {
    let interval = contract.recurrence_interval.filter(|i| *i > 0)?;
    let unit = contract.recurrence_unit?;

    let base = match contract.last_auto_work_generated {
        Some(cursor) => cursor.date_naive(),
        None => match contract.start_date {
            Some(start) => return Some(start),
            None => now.date_naive(),
        },
    };

    Some(match unit {
        RecurrenceUnit::Days => base + Duration::days(i64::from(interval)),
        RecurrenceUnit::Months => {
            let shifted = base
                .checked_add_months(Months::new(interval as u32))
                .unwrap_or(base + Duration::days(30 * i64::from(interval)));
            match contract.recurrence_day_of_month {
                // Clamp to the target month's length: day 31 against a
                // 30-day month lands on day 30.
                Some(dom) => {
                    let day = dom.min(days_in_month(shifted.year(), shifted.month()));
                    shifted.with_day(day).unwrap_or(shifted)
                }
                None => shifted,
            }
        }
    })
}

/// Whether `now` falls inside the lead-time window for `next_due`.
///
/// The window opens `days_before_work` days ahead of the due date. The cursor
/// clause keeps an already-generated occurrence from re-triggering once the
/// cursor advanced past the window open; the authoritative duplicate check
/// against the work order store happens in work_generation regardless.
pub fn generation_window_open(
    contract: &Contract,
    next_due: NaiveDate,
    now: DateTime<Utc>,
) -> bool {
    let generate_at = day_start_utc(next_due - Duration::days(i64::from(contract.days_before_work)));
    if now < generate_at {
        return false;
    }
    match contract.last_auto_work_generated {
        None => true,
        Some(cursor) => cursor < generate_at,
    }
}

/// 00:00 UTC of the given day.
pub fn day_start_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
