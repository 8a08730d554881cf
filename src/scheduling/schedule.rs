use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule `{spec}`: {reason}")]
    InvalidSpec { spec: String, reason: String },
}

impl ScheduleError {
    fn invalid(spec: &str, reason: impl ToString) -> Self {
        Self::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// When a scheduled job fires.
///
/// Accepted forms:
/// * `@every <duration>`, e.g. `@every 500ms`, `@every 1m30s`, `@every 1.5s`,
///   with units `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`;
/// * descriptors such as `@hourly` or `@daily`;
/// * five-field cron expressions (minute precision, seconds fixed at 0);
/// * six-field cron expressions with a leading seconds field;
/// * seven-field expressions with a trailing year, passed to the `cron`
///   crate as they are.
///
/// In five and six-field expressions the day of week follows standard cron:
/// `0` to `6` starting on Sunday, `7` also meaning Sunday, or the names
/// `Sun` to `Sat`. Seven-field expressions use the `cron` crate's own
/// numbering, where Sunday is `1`.
#[derive(Debug, Clone)]
pub enum Schedule {
    Every(Duration),
    Calendar(Box<cron::Schedule>),
}

impl Schedule {
    /// Time from now until the next firing, or `None` if the schedule has
    /// no occurrence left.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            Self::Every(period) => Some(*period),
            Self::Calendar(schedule) => {
                let next = schedule.upcoming(Utc).next()?;
                Some((next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    /// The first firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Every(period) => {
                let period = chrono::Duration::from_std(*period).ok()?;
                after.checked_add_signed(period)
            }
            Self::Calendar(schedule) => schedule.after(&after).next(),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        if let Some(period) = trimmed.strip_prefix("@every") {
            let period =
                parse_duration(period.trim()).map_err(|r| ScheduleError::invalid(spec, r))?;
            return Ok(Self::Every(period));
        }

        let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
        if fields.len() == 5 {
            fields.insert(0, "0".into());
        }
        let expression = if fields.len() == 6 {
            fields[5] = day_of_week(&fields[5]).map_err(|r| ScheduleError::invalid(spec, r))?;
            fields.join(" ")
        } else {
            trimmed.to_string()
        };

        cron::Schedule::from_str(&expression)
            .map(|schedule| Self::Calendar(Box::new(schedule)))
            .map_err(|err| ScheduleError::invalid(spec, err))
    }
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Rewrites a standard day-of-week field (Sunday is 0 or 7) into the `cron`
/// crate's numbering (Sunday is 1), as an explicit list of days.
fn day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok("*".into());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: usize = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step `{step}`"))?;
                if step == 0 {
                    return Err("day-of-week step must be greater than zero".into());
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (first, last) = match range {
            "*" | "?" => (0, 6),
            _ => match range.split_once('-') {
                Some((first, last)) => (weekday(first)?, weekday(last)?),
                // `n/step` runs from n to the end of the week.
                None if step.is_some() => {
                    let day = weekday(range)?;
                    (day, day.max(6))
                }
                None => {
                    let day = weekday(range)?;
                    (day, day)
                }
            },
        };
        if first > last {
            return Err(format!("invalid day-of-week range `{range}`"));
        }

        for day in (first..=last).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }

    let list: Vec<String> = days
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(day, _)| (day + 1).to_string())
        .collect();
    Ok(list.join(","))
}

/// A day of week in standard numbering, Sunday being both 0 and 7.
fn weekday(token: &str) -> Result<usize, String> {
    if let Ok(day) = token.parse::<usize>() {
        return match day {
            0..=7 => Ok(day),
            _ => Err(format!("day of week `{token}` out of range 0-7")),
        };
    }
    let lower = token.to_ascii_lowercase();
    DAY_NAMES
        .iter()
        .position(|name| lower == *name)
        .or_else(|| FULL_NAMES.iter().position(|name| lower == *name))
        .ok_or_else(|| format!("unknown day of week `{token}`"))
}

const FULL_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Parses durations such as `90s`, `1m30s`, `1.5s`, `250ms` or `2h`.
fn parse_duration(input: &str) -> Result<Duration, String> {
    if input.is_empty() {
        return Err("missing duration".into());
    }

    let mut nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (whole, fraction) = match rest[..number_len].split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (&rest[..number_len], ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("expected a number at `{rest}`"));
        }
        if fraction.contains('.') {
            return Err(format!("malformed number at `{rest}`"));
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in `{input}`")),
            unit => return Err(format!("unknown unit `{unit}`")),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("number out of range in `{input}`"))?
        };
        // Longer fractions are truncated.
        let fraction = &fraction[..fraction.len().min(18)];
        let fraction_nanos = if fraction.is_empty() {
            0
        } else {
            let digits: u128 = fraction
                .parse()
                .map_err(|_| format!("malformed number in `{input}`"))?;
            digits * scale / 10u128.pow(fraction.len() as u32)
        };
        nanos = nanos
            .saturating_add(whole.saturating_mul(scale))
            .saturating_add(fraction_nanos);
    }

    if nanos == 0 {
        return Err("duration must be greater than zero".into());
    }
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Ok(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}
