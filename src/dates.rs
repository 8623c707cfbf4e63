//! Calendar helpers for planning extraction ranges and month partitions.

use chrono::{Datelike, Months, NaiveDate};

/// Last day of `month` in `year`.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Split `[start, end]` into per-year ranges ending at the last complete month.
///
/// Every year before `end`'s year is covered through December 31st. In the
/// final year the range stops at the end of the last complete month: `end`'s
/// own month counts only when `end` is the last day of that month.
pub fn valid_date_ranges(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges = Vec::new();

    for year in start.year()..=end.year() {
        let range_start = if year == start.year() {
            start
        } else {
            match NaiveDate::from_ymd_opt(year, 1, 1) {
                Some(d) => d,
                None => continue,
            }
        };

        let range_end = if year < end.year() {
            last_day_of_month(year, 12)
        } else {
            let end_is_month_end = last_day_of_month(end.year(), end.month()) == Some(end);
            let last_complete = if end_is_month_end {
                end.month()
            } else {
                end.month() - 1
            };
            if last_complete == 0 {
                break;
            }
            last_day_of_month(end.year(), last_complete)
        };

        match range_end {
            Some(range_end) if range_start <= range_end => ranges.push((range_start, range_end)),
            _ => {}
        }
    }

    ranges
}

/// Every `(year, month)` touched by `[start, end]`, in order.
pub fn month_partitions(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let mut current = start.with_day(1);

    while let Some(month) = current {
        if month > end {
            break;
        }
        months.push((month.year(), month.month()));
        current = month.checked_add_months(Months::new(1));
    }

    months
}
