use crate::errors::TicketingError;
use chrono::{DateTime, NaiveDateTime, Utc};
use ledger_api::{Bytes32, TxHash, Wei};
use rust_decimal::Decimal;

const ETHER_DECIMALS: u32 = 18;

/// Formats accepted for a concert date without an explicit offset.
/// The first two match an HTML `datetime-local` field.
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Encodes an entity name into the contract's fixed 32-byte identifier.
pub fn encode_name(name: &str) -> Result<Bytes32, TicketingError> {
    Bytes32::from_text(name).ok_or_else(|| {
        TicketingError::InvalidArgument(format!(
            "name {:?} is {} bytes, at most 32 fit",
            name,
            name.len()
        ))
    })
}

/// Parses a decimal ether amount such as `"0.1"` into wei.
pub fn parse_ether(input: &str) -> Result<Wei, TicketingError> {
    let invalid = |why: &str| TicketingError::InvalidAmount(format!("{:?}: {}", input, why));

    let amount = Decimal::from_str_exact(input.trim()).map_err(|e| invalid(&e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(invalid("amount is negative"));
    }
    let scale = amount.scale();
    if scale > ETHER_DECIMALS {
        return Err(invalid("more than 18 decimal places"));
    }
    let mantissa = u128::try_from(amount.mantissa()).map_err(|_| invalid("amount is negative"))?;
    mantissa
        .checked_mul(10u128.pow(ETHER_DECIMALS - scale))
        .map(Wei)
        .ok_or_else(|| invalid("amount is too large"))
}

/// Parses the concert date field into Unix seconds, requiring an instant after `now`.
///
/// Dates without an offset are read as UTC.
pub fn parse_concert_date(input: &str, now: DateTime<Utc>) -> Result<u64, TicketingError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TicketingError::InvalidDate("date is empty".to_string()));
    }

    let instant = DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .ok_or_else(|| TicketingError::InvalidDate(format!("cannot parse {:?}", input)))?;

    if instant <= now {
        return Err(TicketingError::InvalidDate(format!(
            "{} is not in the future",
            instant.to_rfc3339()
        )));
    }
    u64::try_from(instant.timestamp())
        .map_err(|_| TicketingError::InvalidDate(format!("{:?} is out of range", input)))
}

/// Explorer page of a submitted write: `<base-url>/<tx-id>`.
pub fn explorer_link(base: &str, tx: &TxHash) -> String {
    format!("{}/{}", base.trim_end_matches('/'), tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_parse_ether() {
        assert_eq!(parse_ether("0.1").unwrap(), Wei(100_000_000_000_000_000));
        assert_eq!(parse_ether("2").unwrap(), Wei(2 * Wei::PER_ETHER));
        assert_eq!(parse_ether(" 0 ").unwrap(), Wei(0));
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), Wei(1));
    }

    #[test]
    fn test_parse_ether_rejects_malformed() {
        for input in ["", "abc", "-1", "0.1.2", "0.0000000000000000001", "1,5"] {
            assert!(
                matches!(parse_ether(input), Err(TicketingError::InvalidAmount(_))),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_concert_date() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 6, 21, 20, 30, 0).unwrap().timestamp() as u64;
        assert_eq!(parse_concert_date("2025-06-21T20:30", now).unwrap(), expected);
        assert_eq!(parse_concert_date("2025-06-21T20:30:00Z", now).unwrap(), expected);
        assert_eq!(parse_concert_date("2025-06-21T22:30:00+02:00", now).unwrap(), expected);
    }

    #[test]
    fn test_parse_concert_date_rejects_empty_garbage_and_past() {
        let now = Utc::now();
        let past = (now - Duration::days(1)).format("%Y-%m-%dT%H:%M").to_string();
        for input in ["", "   ", "tomorrow", past.as_str()] {
            assert!(
                matches!(parse_concert_date(input, now), Err(TicketingError::InvalidDate(_))),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_encode_name_limit() {
        assert!(encode_name("Daft Punk").is_ok());
        assert!(matches!(
            encode_name(&"é".repeat(17)),
            Err(TicketingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_explorer_link() {
        let tx = TxHash([1; 32]);
        let expected = format!("https://sepolia.etherscan.io/tx/{}", tx);
        assert_eq!(explorer_link("https://sepolia.etherscan.io/tx/", &tx), expected);
        assert_eq!(explorer_link("https://sepolia.etherscan.io/tx", &tx), expected);
    }
}
