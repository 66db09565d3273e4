//! Monetary amount parsing for US-formatted documents.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an amount like "$1,234.56" or "1234.56". Currency symbols and
/// thousand separators are stripped; a leading minus sign is kept so
/// negative amounts survive into validation.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-') || trimmed.starts_with("($");

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// Format an amount in US style ("$1,234.56").
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    let sign = if amount.is_sign_negative() { "-" } else { "" };
    format!("{}${}.{}", sign, formatted, decimal_part)
}
