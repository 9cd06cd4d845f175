pub mod frames;
pub mod gear;
pub mod pictures;
pub mod rolls;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use filmlog_core::domain::DATE_FORMAT;

/// Parse a user supplied "YYYY-MM-DD HH:MM" date.
pub(crate) fn parse_date(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date {value:?}, expected \"YYYY-MM-DD HH:MM\""))
}

pub(crate) fn format_date(date: Option<NaiveDateTime>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

pub(crate) fn or_blank(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date(" 2024-06-01 18:45 ").unwrap();
        assert_eq!(format_date(Some(date)), "2024-06-01 18:45");
    }

    #[test]
    fn test_parse_date_invalid() {
        let err = parse_date("June 1st").unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD HH:MM"));
    }

    #[test]
    fn test_format_date_absent() {
        assert_eq!(format_date(None), "");
    }
}
