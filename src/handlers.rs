// Value Handlers - raw field text → typed values
// Every handler is a pure function; none of them fail. Values that cannot be
// understood come back partially filled (or absent) so a single bad field
// never stops the stream.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// VALUE TYPES
// ============================================================================

/// A (day, month, year) triple where any component may be missing.
///
/// Human-entered genealogy dates are frequently partial ("abt 1850",
/// "Jan 1920"), so each part is tracked separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl PartialDate {
    pub fn new(day: Option<u32>, month: Option<u32>, year: Option<i32>) -> Self {
        PartialDate { day, month, year }
    }

    /// True when day, month and year are all known
    pub fn is_complete(&self) -> bool {
        self.day.is_some() && self.month.is_some() && self.year.is_some()
    }

    /// True when no component is known
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.month.is_none() && self.year.is_none()
    }

    /// Calendar date, if complete and valid (no 31st of February)
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        match (self.day, self.month, self.year) {
            (Some(d), Some(m), Some(y)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        }
    }

    /// "day-month-year" with missing parts rendered as `missing`
    ///
    /// Used by the CSV and TSV outputs: `15-1-1920`, `None-None-1850`.
    pub fn dashed(&self, missing: &str) -> String {
        fn part<T: ToString>(v: Option<T>, missing: &str) -> String {
            v.map(|x| x.to_string()).unwrap_or_else(|| missing.to_string())
        }
        format!(
            "{}-{}-{}",
            part(self.day, missing),
            part(self.month, missing),
            part(self.year, missing)
        )
    }
}

/// Typed result of running a handler over a raw field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Free text, capitalized names and bare link identifiers
    Text(String),
    /// Ordered tokens (given names)
    Names(Vec<String>),
    /// Gender flag (true = male)
    Flag(bool),
    Date(PartialDate),
    /// `None` when the raw value was not `HH:MM:SS`
    Time(Option<NaiveTime>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            FieldValue::Names(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<PartialDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            FieldValue::Time(t) => *t,
            _ => None,
        }
    }
}

// ============================================================================
// STRING HANDLERS
// ============================================================================

/// `GIVN`: whitespace separated names, in order
pub fn given_names(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// `SURN`: "VAN DYKE" → "Van dyke"
pub fn surname(raw: &str) -> String {
    capitalize(raw.trim())
}

/// `_MARNM`: last token of the value, capitalized
pub fn married_name(raw: &str) -> String {
    raw.split_whitespace()
        .last()
        .map(capitalize)
        .unwrap_or_default()
}

/// `SEX`: only "M" (any case) counts as male
pub fn is_male(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("m")
}

/// `HUSB`, `WIFE`, `CHIL`, `FAMC`, `FAMS`, `_UID`: "@I12@" → "I12"
pub fn link_id(raw: &str) -> String {
    raw.replace(crate::config::ID_DELIMITER, "")
}

/// `PLAC`, `NOTE`, `_AKA`
pub fn text(raw: &str) -> String {
    raw.to_string()
}

/// Upper-case the first character, lower-case the rest
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// ============================================================================
// TIME HANDLER
// ============================================================================

/// `TIME`: fixed `HH:MM:SS`
pub fn time_of_day(raw: &str) -> Option<NaiveTime> {
    match NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S") {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(value = raw, error = %e, "Expected time as HH:MM:SS, ignoring");
            None
        }
    }
}

// ============================================================================
// DATE HEURISTIC
// ============================================================================

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// `DATE`: best-effort (day, month, year) from free text
///
/// Rules, applied per whitespace token after parenthesized asides are removed:
/// - no digits at all → month abbreviation (first three letters), else dropped
/// - more than two digits → year
/// - one or two digits → day
///
/// Non-digit characters are ignored when classifying, so "c1850" and
/// "1850?" are both years. Later tokens win over earlier ones.
///
/// # Examples
/// ```
/// use ged_ingest::handlers::{parse_date, PartialDate};
///
/// assert_eq!(parse_date("15 Jan 1920"), PartialDate::new(Some(15), Some(1), Some(1920)));
/// assert_eq!(parse_date("abt 1850"), PartialDate::new(None, None, Some(1850)));
/// ```
pub fn parse_date(raw: &str) -> PartialDate {
    let cleaned = strip_parenthesized(raw);
    let mut date = PartialDate::default();

    for token in cleaned.split_whitespace() {
        let digits = digits_only(token);

        if digits.is_empty() {
            if let Some(m) = month_from_abbrev(token) {
                date.month = Some(m);
            }
        } else if digits.len() > 2 {
            if let Ok(y) = digits.parse::<i32>() {
                date.year = Some(y);
            }
        } else if let Ok(d) = digits.parse::<u32>() {
            date.day = Some(d);
        }
    }

    if date.is_empty() && !raw.trim().is_empty() {
        tracing::debug!(value = raw, "No date components recognized");
    }

    date
}

/// Remove every "(...)" aside, parentheses included.
///
/// Unbalanced input is returned unchanged.
pub fn strip_parenthesized(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth: usize = 0;

    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return raw.to_string();
                }
                depth -= 1;
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    if depth != 0 {
        return raw.to_string();
    }
    out
}

/// Keep only ASCII digits
pub fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// "Jan", "JANUARY", "jan." → 1
pub fn month_from_abbrev(token: &str) -> Option<u32> {
    let abbrev: String = token.chars().take(3).collect::<String>().to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|i| i as u32 + 1)
}

/// Textual id → integer id: "I0042" → 42, "X" → 0
///
/// Digits too large for an `i64` saturate to `i64::MAX` with a warning.
pub fn force_int(s: &str) -> i64 {
    let digits = digits_only(s);
    if digits.is_empty() {
        return 0;
    }
    match digits.parse() {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(id = s, error = %e, "Numeric id out of range, saturating");
            i64::MAX
        }
    }
}

// ============================================================================
// CHANGE TIMESTAMP
// ============================================================================

/// Combine a `CHAN` block's date and time into one timestamp
///
/// Only complete, valid dates produce a timestamp; a missing time means
/// midnight.
pub fn change_timestamp(date: &PartialDate, time: Option<NaiveTime>) -> Option<NaiveDateTime> {
    let day = date.to_naive_date()?;
    Some(day.and_time(time.unwrap_or(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_full() {
        assert_eq!(
            parse_date("15 Jan 1920"),
            PartialDate::new(Some(15), Some(1), Some(1920))
        );
    }

    #[test]
    fn test_parse_date_qualifier_dropped() {
        assert_eq!(parse_date("abt 1850"), PartialDate::new(None, None, Some(1850)));
        assert_eq!(parse_date("BEF 3 MAR 1701"), PartialDate::new(Some(3), Some(3), Some(1701)));
    }

    #[test]
    fn test_parse_date_parenthesized_aside_removed() {
        assert_eq!(
            parse_date("Jan (estimated) 1920"),
            PartialDate::new(None, Some(1), Some(1920))
        );
        // digits inside the aside must not leak into the day
        assert_eq!(
            parse_date("12 Feb 1901 (2)"),
            PartialDate::new(Some(12), Some(2), Some(1901))
        );
    }

    #[test]
    fn test_parse_date_unbalanced_parens_kept() {
        // "(est" has no digits and is not a month, "1920)" is still a year
        assert_eq!(
            parse_date("Jan (est 1920"),
            PartialDate::new(None, Some(1), Some(1920))
        );
        assert_eq!(strip_parenthesized("a) b (c"), "a) b (c");
    }

    #[test]
    fn test_parse_date_year_only() {
        assert_eq!(parse_date("1850"), PartialDate::new(None, None, Some(1850)));
        assert_eq!(parse_date("c1850"), PartialDate::new(None, None, Some(1850)));
    }

    #[test]
    fn test_parse_date_long_month_names() {
        assert_eq!(
            parse_date("4 September 1888"),
            PartialDate::new(Some(4), Some(9), Some(1888))
        );
        assert_eq!(parse_date("Dec. 1900").month, Some(12));
    }

    #[test]
    fn test_parse_date_garbage_is_empty() {
        assert!(parse_date("unknown").is_empty());
        assert!(parse_date("").is_empty());
        assert!(parse_date("   ").is_empty());
    }

    #[test]
    fn test_month_from_abbrev() {
        assert_eq!(month_from_abbrev("jan"), Some(1));
        assert_eq!(month_from_abbrev("DEC"), Some(12));
        assert_eq!(month_from_abbrev("Ma"), None);
        assert_eq!(month_from_abbrev("abt"), None);
    }

    #[test]
    fn test_gender() {
        assert!(is_male("M"));
        assert!(is_male("m"));
        assert!(!is_male("F"));
        assert!(!is_male("U"));
        assert!(!is_male(""));
    }

    #[test]
    fn test_surname_capitalization() {
        assert_eq!(surname("SMITH"), "Smith");
        assert_eq!(surname("mcdonald"), "Mcdonald");
        assert_eq!(surname(""), "");
    }

    #[test]
    fn test_married_name_takes_last_token() {
        assert_eq!(married_name("Mary JONES"), "Jones");
        assert_eq!(married_name("brown"), "Brown");
        assert_eq!(married_name(""), "");
    }

    #[test]
    fn test_given_names_in_order() {
        assert_eq!(given_names("John  Henry"), vec!["John", "Henry"]);
        assert!(given_names("").is_empty());
    }

    #[test]
    fn test_link_id_strips_delimiters() {
        assert_eq!(link_id("@I12@"), "I12");
        assert_eq!(link_id("F3"), "F3");
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(time_of_day("13:05:09"), NaiveTime::from_hms_opt(13, 5, 9));
        assert_eq!(time_of_day("1pm"), None);
    }

    #[test]
    fn test_change_timestamp_defaults_to_midnight() {
        let date = PartialDate::new(Some(2), Some(3), Some(2004));
        let ts = change_timestamp(&date, None).unwrap();
        assert_eq!(ts.to_string(), "2004-03-02 00:00:00");

        let time = NaiveTime::from_hms_opt(10, 30, 0);
        let ts = change_timestamp(&date, time).unwrap();
        assert_eq!(ts.to_string(), "2004-03-02 10:30:00");
    }

    #[test]
    fn test_change_timestamp_requires_complete_valid_date() {
        let partial = PartialDate::new(None, Some(3), Some(2004));
        assert_eq!(change_timestamp(&partial, None), None);

        let invalid = PartialDate::new(Some(31), Some(2), Some(2004));
        assert_eq!(change_timestamp(&invalid, None), None);
    }

    #[test]
    fn test_dashed_rendering() {
        let date = PartialDate::new(None, Some(1), Some(1920));
        assert_eq!(date.dashed("None"), "None-1-1920");
    }

    #[test]
    fn test_force_int() {
        assert_eq!(force_int("I0042"), 42);
        assert_eq!(force_int("X"), 0);
    }

    #[test]
    fn test_force_int_overflow_saturates() {
        assert_eq!(force_int("@I99999999999999999999@"), i64::MAX);
        assert_eq!(force_int("I9223372036854775807"), i64::MAX);
        assert_eq!(force_int("I9223372036854775806"), i64::MAX - 1);
    }
}
