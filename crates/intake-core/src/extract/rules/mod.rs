//! Shared text rules for deterministic field extraction and validation.

pub mod amounts;
pub mod dates;
pub mod patterns;

pub use amounts::{format_amount, parse_amount};
pub use dates::parse_date;
pub use patterns::*;
