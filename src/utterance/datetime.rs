use super::words;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

fn weekday(word: &str) -> Option<Weekday> {
    let day = match word.trim_end_matches("'s") {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn month(word: &str) -> Option<u32> {
    MONTHS.iter().find(|(name, _)| *name == word).map(|(_, m)| *m)
}

/// "23", "23rd", "1st" -> day of month
fn day_number(word: &str) -> Option<u32> {
    let digits = word
        .trim_end_matches("st")
        .trim_end_matches("nd")
        .trim_end_matches("rd")
        .trim_end_matches("th");
    digits.parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

/// Next occurrence of `day` strictly after `today`
fn next_weekday(today: NaiveDate, day: Weekday) -> NaiveDate {
    let ahead = (day.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64 + 7) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead)
}

/// Month/day without a year: this year, or next year if already past
fn upcoming(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

/// Parse a spoken date relative to `today`
///
/// Understands "today", "tomorrow", "day after tomorrow", weekday names (the next
/// occurrence after today), "October 23rd", "23rd of October", "10/23", and ISO dates.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let words = words(text);
    let joined = words.join(" ");

    if joined.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }

    for (i, word) in words.iter().enumerate() {
        match word.as_str() {
            "today" | "tonight" => return Some(today),
            "tomorrow" => return Some(today + Duration::days(1)),
            _ => {}
        }

        if let Some(day) = weekday(word) {
            return Some(next_weekday(today, day));
        }

        if let Ok(date) = NaiveDate::parse_from_str(word, "%Y-%m-%d") {
            return Some(date);
        }

        if let Some(date) = parse_slash_date(word, today) {
            return Some(date);
        }

        if let Some(m) = month(word) {
            // "october 23" or "23rd of october"
            let after = words.get(i + 1).and_then(|w| day_number(w));
            let before = i
                .checked_sub(1)
                .and_then(|j| words.get(j))
                .filter(|w| w.as_str() != "of")
                .and_then(|w| day_number(w))
                .or_else(|| {
                    (i >= 2 && words[i - 1] == "of")
                        .then(|| day_number(&words[i - 2]))
                        .flatten()
                });

            if let Some(d) = after.or(before) {
                if let Some(date) = upcoming(today, m, d) {
                    return Some(date);
                }
            }
        }
    }

    None
}

fn parse_slash_date(word: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<&str> = word.split('/').collect();
    match parts.as_slice() {
        [m, d] => upcoming(today, m.parse().ok()?, d.parse().ok()?),
        [m, d, y] => {
            let mut year: i32 = y.parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
        }
        _ => None,
    }
}

/// Business-hours guess for a bare hour: "at 3" means 3 PM
fn assume_meridiem(hour: u32) -> u32 {
    if (1..=7).contains(&hour) {
        hour + 12
    } else {
        hour
    }
}

fn apply_meridiem(hour: u32, meridiem: &str) -> Option<u32> {
    match (meridiem, hour) {
        (_, h) if h == 0 || h > 12 => None,
        ("am", 12) => Some(0),
        ("am", h) => Some(h),
        ("pm", 12) => Some(12),
        ("pm", h) => Some(h + 12),
        _ => None,
    }
}

/// Split "3:30pm" into ("3", Some("30"), Some("pm"))
fn split_clock(word: &str) -> Option<(u32, u32, Option<&str>)> {
    let (body, meridiem) = if let Some(body) = word.strip_suffix("am") {
        (body, Some("am"))
    } else if let Some(body) = word.strip_suffix("pm") {
        (body, Some("pm"))
    } else {
        (word, None)
    };

    let (hour, minute) = match body.split_once(':') {
        Some((h, m)) => (h.parse().ok()?, m.parse().ok()?),
        None => (body.parse().ok()?, 0),
    };

    if minute > 59 {
        return None;
    }
    Some((hour, minute, meridiem))
}

/// Parse a spoken time of day
///
/// Accepts "3pm", "3 p.m.", "3:30 pm", "15:00", "noon", "midnight", "3 o'clock" and
/// "at 3". A bare number is only a time when something marks it as one, so the day in
/// "October 23" is never read as an hour.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let words = words(text);

    for (i, word) in words.iter().enumerate() {
        match word.as_str() {
            "noon" | "midday" => return NaiveTime::from_hms_opt(12, 0, 0),
            "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
            _ => {}
        }

        let Some((hour, minute, meridiem)) = split_clock(word) else {
            continue;
        };

        let next = words.get(i + 1).map(String::as_str);
        let previous = i.checked_sub(1).and_then(|j| words.get(j)).map(String::as_str);
        let has_colon = word.contains(':');

        let hour = match (meridiem, next) {
            (Some(m), _) => apply_meridiem(hour, m),
            (None, Some(m @ ("am" | "pm"))) => apply_meridiem(hour, m),
            (None, Some("o'clock" | "oclock")) => Some(assume_meridiem(hour)),
            (None, _) if has_colon && hour <= 23 => Some(if hour > 12 { hour } else { assume_meridiem(hour) }),
            (None, _) if previous == Some("at") && (1..=12).contains(&hour) => Some(assume_meridiem(hour)),
            _ => None,
        };

        if let Some(time) = hour.and_then(|h| NaiveTime::from_hms_opt(h, minute, 0)) {
            return Some(time);
        }
    }

    None
}

/// Date and time found anywhere in the text
pub fn parse_date_time(text: &str, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveTime>) {
    (parse_date(text, today), parse_time(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tuesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_relative_dates() {
        assert_eq!(parse_date("today please", today()), Some(today()));
        assert_eq!(parse_date("tomorrow", today()), Some(date(10, 21)));
        assert_eq!(parse_date("the day after tomorrow", today()), Some(date(10, 22)));
    }

    #[test]
    fn test_weekdays_are_upcoming() {
        assert_eq!(parse_date("Friday", today()), Some(date(10, 23)));
        assert_eq!(parse_date("move it to fri", today()), Some(date(10, 23)));
        assert_eq!(parse_date("Monday", today()), Some(date(10, 26)));
        // Same weekday means next week
        assert_eq!(parse_date("Tuesday", today()), Some(date(10, 27)));
    }

    #[test]
    fn test_month_day() {
        assert_eq!(parse_date("October 30th", today()), Some(date(10, 30)));
        assert_eq!(parse_date("the 2nd of November", today()), Some(date(11, 2)));
        assert_eq!(parse_date("nov 2", today()), Some(date(11, 2)));
        assert_eq!(
            parse_date("January 5", today()),
            NaiveDate::from_ymd_opt(2027, 1, 5)
        );
    }

    #[test]
    fn test_numeric_dates() {
        assert_eq!(parse_date("2026-11-03", today()), Some(date(11, 3)));
        assert_eq!(parse_date("on 11/3", today()), Some(date(11, 3)));
        assert_eq!(parse_date("11/3/26", today()), Some(date(11, 3)));
    }

    #[test]
    fn test_no_date() {
        assert_eq!(parse_date("3pm", today()), None);
        assert_eq!(parse_date("whenever works", today()), None);
        assert_eq!(parse_date("February 30", today()), None);
    }

    #[test]
    fn test_times() {
        assert_eq!(parse_time("3pm"), Some(time(15, 0)));
        assert_eq!(parse_time("3 p.m."), Some(time(15, 0)));
        assert_eq!(parse_time("at 3:30 pm"), Some(time(15, 30)));
        assert_eq!(parse_time("10am"), Some(time(10, 0)));
        assert_eq!(parse_time("12 am"), Some(time(0, 0)));
        assert_eq!(parse_time("15:00"), Some(time(15, 0)));
        assert_eq!(parse_time("noon"), Some(time(12, 0)));
        assert_eq!(parse_time("4 o'clock"), Some(time(16, 0)));
        assert_eq!(parse_time("at 9"), Some(time(9, 0)));
    }

    #[test]
    fn test_bare_numbers_are_not_times() {
        assert_eq!(parse_time("October 23"), None);
        assert_eq!(parse_time("the 2nd one"), None);
        assert_eq!(parse_time("13pm"), None);
    }

    #[test]
    fn test_date_and_time_together() {
        assert_eq!(
            parse_date_time("Friday 3pm", today()),
            (Some(date(10, 23)), Some(time(15, 0)))
        );
        assert_eq!(parse_date_time("Friday", today()), (Some(date(10, 23)), None));
    }
}
