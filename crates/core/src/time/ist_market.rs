use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use std::collections::HashSet;

// IST = UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

// Before this time (IST) the current session is not closed yet, so the as-of date is the
// previous business day. NSE closes at 15:30 IST.
const CLOSE_CUTOFF_HOUR_IST: u32 = 16;
const CLOSE_CUTOFF_MINUTE_IST: u32 = 0;

pub const DEFAULT_DAILY_ANALYSIS_TIME: &str = "09:00";

pub fn ist() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(IST_OFFSET_SECS).context("invalid IST offset")
}

/// Explicit `YYYY-MM-DD` wins; otherwise the latest closed business day in IST.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    resolve_as_of_date_with(as_of_date_arg, now_utc, &configured_holidays())
}

fn resolve_as_of_date_with(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    holidays: &HashSet<NaiveDate>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }

    let now_ist = now_utc.with_timezone(&ist()?);

    let cutoff_reached =
        (now_ist.hour(), now_ist.minute()) >= (CLOSE_CUTOFF_HOUR_IST, CLOSE_CUTOFF_MINUTE_IST);
    let mut date = now_ist.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    Ok(previous_business_day_or_same(date, holidays))
}

/// Instant at which `date`'s session counts as closed (the as-of cutoff, in UTC).
pub fn session_close_utc(date: NaiveDate) -> anyhow::Result<DateTime<Utc>> {
    let cutoff = NaiveTime::from_hms_opt(CLOSE_CUTOFF_HOUR_IST, CLOSE_CUTOFF_MINUTE_IST, 0)
        .context("invalid close cutoff")?;
    let close = date
        .and_time(cutoff)
        .and_local_timezone(ist()?)
        .single()
        .context("ambiguous IST close time")?;
    Ok(close.with_timezone(&Utc))
}

/// Today's date in IST, used for signal expiry checks.
pub fn today_ist(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    Ok(now_utc.with_timezone(&ist()?).date_naive())
}

pub fn is_business_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    !is_weekend(date) && !holidays.contains(&date)
}

fn previous_business_day_or_same(mut date: NaiveDate, holidays: &HashSet<NaiveDate>) -> NaiveDate {
    while !is_business_day(date, holidays) {
        date = date - Duration::days(1);
    }
    date
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

/// Fixed-date exchange holidays plus `MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD"`.
pub fn configured_holidays() -> HashSet<NaiveDate> {
    let mut out = HashSet::new();
    for y in 2024..=2030 {
        for (m, d) in [(1, 26), (8, 15), (10, 2), (12, 25)] {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.insert(date);
            }
        }
    }

    if let Ok(s) = std::env::var("MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                Ok(d) => {
                    out.insert(d);
                }
                Err(_) => tracing::warn!(value = part, "ignoring invalid MARKET_HOLIDAYS entry"),
            }
        }
    }

    out
}

/// Parses `HH:MM` (24h).
pub fn parse_daily_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("invalid daily time {s:?} (expected HH:MM)"))
}

/// Next instant strictly after `now_utc` at which the IST wall clock reads `at`.
pub fn next_run_after(now_utc: DateTime<Utc>, at: NaiveTime) -> anyhow::Result<DateTime<Utc>> {
    let offset = ist()?;
    let now_ist = now_utc.with_timezone(&offset);

    let today = now_ist
        .date_naive()
        .and_time(at)
        .and_local_timezone(offset)
        .single()
        .context("ambiguous IST schedule time")?;

    let next = if today > now_ist {
        today
    } else {
        today + Duration::days(1)
    };
    Ok(next.with_timezone(&Utc))
}
