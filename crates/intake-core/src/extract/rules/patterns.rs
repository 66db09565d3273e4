//! Common regex patterns for claim and bill extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Line item row: service description, billing code, amount, all on
    // one text line. e.g. "Blood Panel 80050 $125.00"
    pub static ref LINE_ITEM_ROW: Regex = Regex::new(
        r"([A-Za-z][A-Za-z0-9 \-]{2,40})[ \t]+([A-Z0-9]{3,12})[ \t]+\$?([0-9]+\.[0-9]{2})"
    ).unwrap();

    // Validation shapes.
    pub static ref IDENTIFIER_SHAPE: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9\-]*$"
    ).unwrap();

    pub static ref NAME_SHAPE: Regex = Regex::new(
        r"^[A-Za-z][A-Za-z0-9 ,.'-]*$"
    ).unwrap();

    pub static ref CODE_SHAPE: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9\-.]{1,15}$"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_row_matches() {
        let caps = LINE_ITEM_ROW
            .captures("Office Visit 99213 $150.00")
            .unwrap();
        assert_eq!(caps[1].trim(), "Office Visit");
        assert_eq!(&caps[2], "99213");
        assert_eq!(&caps[3], "150.00");
    }

    #[test]
    fn test_identifier_shape() {
        assert!(IDENTIFIER_SHAPE.is_match("CLM-2025-0042"));
        assert!(!IDENTIFIER_SHAPE.is_match("CLM 2025"));
        assert!(!IDENTIFIER_SHAPE.is_match(""));
    }

    #[test]
    fn test_code_shape() {
        assert!(CODE_SHAPE.is_match("99213"));
        assert!(CODE_SHAPE.is_match("J-1100"));
        assert!(!CODE_SHAPE.is_match("a"));
    }
}
