use chrono::NaiveDate;

const FORMATS: [&str; 4] = ["%d %b %Y", "%d %B %Y", "%d %b, %Y", "%Y-%m-%d"];
const MONTH_NAME_FORMATS: [&str; 2] = ["%d %b %Y", "%d %B %Y"];

/// Parse the date strings found in chart labels ("08 Jan 2022", "15 March 2023",
/// "1 Sept 2021", "2022-01-08").
///
/// Returns `None` for anything else; partial dates are routine here.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let normalized = text.trim().replace("Sept ", "Sep ");
    if normalized.is_empty() {
        return None;
    }

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
        .or_else(|| parse_day_month_year(&normalized))
}

// "007 Jan 2022", "8   January  2022"
fn parse_day_month_year(text: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    let day: u32 = day.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    let rebuilt = format!("{} {} {}", day, month, year);

    MONTH_NAME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&rebuilt, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn abbreviated_and_full_month_names_agree() {
        assert_eq!(parse_date("15 Mar 2023"), ymd(2023, 3, 15));
        assert_eq!(parse_date("15 March 2023"), ymd(2023, 3, 15));
    }

    #[test]
    fn sept_alias_is_normalized() {
        assert_eq!(parse_date("15 Sept 2023"), ymd(2023, 9, 15));
        assert_eq!(parse_date("15 Sep 2023"), ymd(2023, 9, 15));
        assert_eq!(parse_date("15 September 2023"), ymd(2023, 9, 15));
    }

    #[test]
    fn comma_and_iso_forms() {
        assert_eq!(parse_date("08 Jan, 2022"), ymd(2022, 1, 8));
        assert_eq!(parse_date("2022-01-08"), ymd(2022, 1, 8));
        assert_eq!(parse_date("  01 Jan 2022  "), ymd(2022, 1, 1));
    }

    #[test]
    fn three_token_fallback_handles_odd_day_padding() {
        assert_eq!(parse_date("008 Jan 2022"), ymd(2022, 1, 8));
    }

    #[test]
    fn garbage_and_partial_dates_are_none() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Jan 2022"), None);
        assert_eq!(parse_date("31 Feb 2022"), None);
        assert_eq!(parse_date("Weekly Contest 300"), None);
    }
}
