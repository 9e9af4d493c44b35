//! Amount parsing for SAP-style locale-formatted tokens.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::AdviceError;

/// Parse an SAP amount string such as `1.234,56` or `1.234,56-`.
///
/// The `.` characters are thousands separators, `,` is the decimal point and
/// a trailing `-` denotes a negative value.
pub fn parse_advice_amount(val: &str) -> Result<Decimal, AdviceError> {
    let mut parsed = val.replace('.', "").replace(',', ".");

    if parsed.ends_with('-') {
        parsed = format!("-{}", parsed.replace('-', ""));
    }

    Decimal::from_str(&parsed).map_err(|_| AdviceError::AmountFormat(val.to_string()))
}

/// Parse a column of SAP amount strings element-wise.
///
/// The column must carry at least one value; an empty column means item
/// extraction found nothing to fill it and is treated as a failure.
pub fn parse_amount_column(
    vals: &[String],
    field: &'static str,
) -> Result<Vec<Decimal>, AdviceError> {
    if vals.is_empty() {
        return Err(AdviceError::EmptyAmountColumn(field));
    }

    vals.iter().map(|v| parse_advice_amount(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_advice_amount() {
        assert_eq!(parse_advice_amount("1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_advice_amount("1.234,56-").unwrap(), dec("-1234.56"));
        assert_eq!(parse_advice_amount("0,00").unwrap(), dec("0.00"));
        assert_eq!(parse_advice_amount("50,00-").unwrap(), dec("-50.00"));
        assert_eq!(parse_advice_amount("19,00").unwrap(), dec("19.00"));
        assert_eq!(parse_advice_amount("12.345.678,90").unwrap(), dec("12345678.90"));
    }

    #[test]
    fn test_parse_advice_amount_plain_zero() {
        // Positional defaults come in as "0.00" with a dot separator.
        assert_eq!(parse_advice_amount("0.00").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_advice_amount_invalid() {
        let err = parse_advice_amount("EUR").unwrap_err();
        assert!(matches!(err, AdviceError::AmountFormat(_)));
    }

    #[test]
    fn test_parse_amount_column() {
        let vals = vec!["100,00".to_string(), "50,00-".to_string()];
        let parsed = parse_amount_column(&vals, "Gross_Amount").unwrap();
        assert_eq!(parsed, vec![dec("100.00"), dec("-50.00")]);
    }

    #[test]
    fn test_parse_amount_column_empty() {
        let err = parse_amount_column(&[], "Net_Amount").unwrap_err();
        assert!(matches!(err, AdviceError::EmptyAmountColumn("Net_Amount")));
    }
}
