//! Transition guards
//!
//! Pure predicates evaluated by the `validate` regions.

const ADDRESS_PREFIX: &str = "0x";
const ADDRESS_LENGTH: usize = 42;

/// Recipient starts with `0x`
pub fn is_0x_address(to_address: &str) -> bool {
    to_address.starts_with(ADDRESS_PREFIX)
}

/// Recipient is exactly 42 characters long
pub fn is_42_char_address(to_address: &str) -> bool {
    to_address.chars().count() == ADDRESS_LENGTH
}

/// Amount is strictly positive (NaN fails)
pub fn minimum_funds(amount: f64) -> bool {
    amount > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_0x_address() {
        assert!(is_0x_address("0x"));
        assert!(is_0x_address("0xABCDEF0123456789ABCDEF0123456789ABCDEF01"));
        assert!(!is_0x_address(""));
        assert!(!is_0x_address("1x1234"));
        assert!(!is_0x_address("0X1234"));
    }

    #[test]
    fn test_is_42_char_address() {
        assert!(is_42_char_address("0xABCDEF0123456789ABCDEF0123456789ABCDEF01"));
        assert!(!is_42_char_address("0xABCDEF0123456789ABCDEF0123456789ABCDEF0"));
        assert!(!is_42_char_address("0xABCDEF0123456789ABCDEF0123456789ABCDEF012"));
        // Length only; content is not checked here
        assert!(is_42_char_address(&"z".repeat(42)));
    }

    #[test]
    fn test_minimum_funds() {
        assert!(minimum_funds(50.0));
        assert!(minimum_funds(0.000001));
        assert!(!minimum_funds(0.0));
        assert!(!minimum_funds(-1.0));
        assert!(!minimum_funds(f64::NAN));
    }
}
