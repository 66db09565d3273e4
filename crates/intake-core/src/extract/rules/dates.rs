//! Date parsing for US-formatted documents.

use chrono::NaiveDate;

const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y", "%Y/%m/%d"];

/// Parse a date of service. ISO and common US formats are accepted; the
/// first format that parses wins.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        assert_eq!(parse_date("2025-02-10"), Some(expected));
        assert_eq!(parse_date("02/10/2025"), Some(expected));
        assert_eq!(parse_date("02/10/25"), Some(expected));
        assert_eq!(parse_date("02-10-2025"), Some(expected));
    }

    #[test]
    fn test_malformed_dates_rejected() {
        assert_eq!(parse_date("13/45/2025"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }
}
