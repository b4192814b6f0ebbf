use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// day of month every loan falls due on
pub const DUE_DAY_OF_MONTH: u32 = 5;

/// due date for a loan started on `start_date`: the 5th of the following month.
///
/// The start day is irrelevant, so a loan started on the 1st and one started on the
/// 31st of the same month share a due date. December rolls into January of the next year.
pub fn compute_due_date(start_date: NaiveDate) -> NaiveDate {
    let (year, month) = if start_date.month() == 12 {
        (start_date.year() + 1, 1)
    } else {
        (start_date.year(), start_date.month() + 1)
    };

    // the 5th exists in every month
    NaiveDate::from_ymd_opt(year, month, DUE_DAY_OF_MONTH)
        .unwrap_or(start_date)
}

/// true once the calendar day of `now` is strictly after `due_date`
pub fn is_past_due(due_date: NaiveDate, now: DateTime<Utc>) -> bool {
    now.date_naive() > due_date
}

/// whole days between the due date and `now`, zero when not yet due
pub fn days_past_due(due_date: NaiveDate, now: DateTime<Utc>) -> u32 {
    let days = (now.date_naive() - due_date).num_days();
    if days > 0 {
        days as u32
    } else {
        0
    }
}
