use core::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A calendar or clock field addressed by a date-format token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatePart {
    /// `YYYY`: four-digit year.
    Year,
    /// `YY`: last two digits of the year.
    ShortYear,
    /// `MM`: month, `01`-`12`.
    Month,
    /// `DD`: day of month, `01`-`31`.
    Day,
    /// `HH`: hour on a 24-hour clock, `00`-`23`.
    Hour,
    /// `mm`: minute, `00`-`59`.
    Minute,
    /// `ss`: second, `00`-`59`.
    Second,
}

// Longest tokens first so `YYYY` is never read as two `YY`.
const TOKENS: [(&str, DatePart); 7] = [
    ("YYYY", DatePart::Year),
    ("YY", DatePart::ShortYear),
    ("MM", DatePart::Month),
    ("DD", DatePart::Day),
    ("HH", DatePart::Hour),
    ("mm", DatePart::Minute),
    ("ss", DatePart::Second),
];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DateToken {
    Part(DatePart),
    Literal(String),
}

/// A compiled date format such as `YYYYMMDD` or `YY-MM/HH:mm`.
///
/// The format is scanned left to right; at each position the longest
/// matching token wins, and anything that is not a token is copied through
/// verbatim.
///
/// # Example
///
/// ```
/// use autocode::DateFormat;
/// use chrono::NaiveDate;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 5)
///     .and_then(|d| d.and_hms_opt(8, 4, 9))
///     .unwrap();
///
/// assert_eq!(DateFormat::parse("YYYYMMDD").render(now), "20240305");
/// assert_eq!(DateFormat::parse("YY/MM HH:mm:ss").render(now), "24/03 08:04:09");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DateFormat {
    source: String,
    tokens: Vec<DateToken>,
}

impl DateFormat {
    pub fn parse(format: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = format;

        'scan: while !rest.is_empty() {
            for (token, part) in TOKENS {
                if let Some(tail) = rest.strip_prefix(token) {
                    if !literal.is_empty() {
                        tokens.push(DateToken::Literal(core::mem::take(&mut literal)));
                    }
                    tokens.push(DateToken::Part(part));
                    rest = tail;
                    continue 'scan;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
        if !literal.is_empty() {
            tokens.push(DateToken::Literal(literal));
        }

        Self {
            source: format.to_owned(),
            tokens,
        }
    }

    /// The format string this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[DateToken] {
        &self.tokens
    }

    /// Formats `now`, appending to `out`.
    pub fn render_into(&self, now: NaiveDateTime, out: &mut String) {
        use fmt::Write;

        for token in &self.tokens {
            // Writing into a `String` cannot fail.
            let _ = match token {
                DateToken::Literal(text) => out.write_str(text),
                DateToken::Part(DatePart::Year) => write!(out, "{:04}", now.year()),
                DateToken::Part(DatePart::ShortYear) => {
                    write!(out, "{:02}", now.year().rem_euclid(100))
                }
                DateToken::Part(DatePart::Month) => write!(out, "{:02}", now.month()),
                DateToken::Part(DatePart::Day) => write!(out, "{:02}", now.day()),
                DateToken::Part(DatePart::Hour) => write!(out, "{:02}", now.hour()),
                DateToken::Part(DatePart::Minute) => write!(out, "{:02}", now.minute()),
                DateToken::Part(DatePart::Second) => write!(out, "{:02}", now.second()),
            };
        }
    }

    pub fn render(&self, now: NaiveDateTime) -> String {
        let mut out = String::with_capacity(self.source.len() + 4);
        self.render_into(now, &mut out);
        out
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for DateFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for DateFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Ok(Self::parse(&source))
    }
}
