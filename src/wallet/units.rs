//! Token unit conversion
//!
//! Amounts are typed in human units and sent on-chain in smallest units
//! (`human * 10^decimals`). The on-chain side is exact 256-bit integer
//! arithmetic on the decimal digits; the display side is a float quotient.

use ethers::types::U256;

use crate::error::{Error, Result};

/// Convert a human-unit amount to smallest units
///
/// Digits past `decimals` are rounded half-up, matching what wallet
/// libraries do when parsing user input.
pub fn to_smallest_unit(amount: f64, decimals: u32) -> Result<U256> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount(amount.to_string()));
    }

    // f64 Display never uses exponent notation
    let text = amount.to_string();
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let scale = decimals as usize;
    let (kept, round_up) = if fraction.len() > scale {
        (&fraction[..scale], fraction.as_bytes()[scale] >= b'5')
    } else {
        (fraction, false)
    };

    let digits = format!("{}{:0<width$}", integer, kept, width = scale);
    let value = U256::from_dec_str(&digits)
        .map_err(|e| Error::InvalidAmount(format!("{} at {} decimals: {:?}", amount, decimals, e)))?;

    if round_up {
        value
            .checked_add(U256::one())
            .ok_or_else(|| Error::InvalidAmount(format!("{} overflows 256 bits", amount)))
    } else {
        Ok(value)
    }
}

/// Convert a smallest-unit integer to a human-unit float for display
pub fn from_smallest_unit(raw: U256, decimals: u32) -> Result<f64> {
    let digits = raw.to_string();
    let scale = decimals as usize;

    let text = if scale == 0 {
        digits
    } else {
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        format!("{}.{}", integer, fraction)
    };

    text.parse::<f64>()
        .map_err(|e| Error::Internal(format!("Cannot read balance {}: {}", text, e)))
}
