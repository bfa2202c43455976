//! PIN handling - duress PIN rules, keypad buffer and duress detection

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pattern::PATTERN_LENGTH;
use super::result::{Error, Result};

/// PINs too common to be used as a duress PIN
pub const WEAK_PINS: [&str; 11] = [
    "0000", "1111", "2222", "3333", "4444", "5555", "6666", "7777", "8888", "9999", "1234",
];

/// Whether a PIN is in the weak set
pub fn is_weak_pin(pin: &str) -> bool {
    WEAK_PINS.contains(&pin)
}

/// A secondary PIN that authenticates the user but activates decoy mode
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DuressPin(String);

impl DuressPin {
    pub fn parse(pin: &str) -> Result<Self> {
        if pin.len() != PATTERN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::validation("Duress PIN must be exactly 4 digits."));
        }
        if is_weak_pin(pin) {
            return Err(Error::WeakDuressPin);
        }
        Ok(Self(pin.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep the PIN out of debug output and logs
impl fmt::Debug for DuressPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DuressPin(****)")
    }
}

impl TryFrom<String> for DuressPin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DuressPin::parse(&value)
    }
}

impl From<DuressPin> for String {
    fn from(pin: DuressPin) -> Self {
        pin.0
    }
}

/// Result of comparing an entered PIN against the stored credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinVerdict {
    Real,
    Duress,
    Invalid,
}

/// Classify an entered PIN. The dynamic PIN wins when both match.
pub fn classify(entered: &str, dynamic_pin: &str, duress_pin: &str) -> PinVerdict {
    let real = constant_time_eq(entered.as_bytes(), dynamic_pin.as_bytes());
    let duress = constant_time_eq(entered.as_bytes(), duress_pin.as_bytes());
    if real {
        PinVerdict::Real
    } else if duress {
        PinVerdict::Duress
    } else {
        PinVerdict::Invalid
    }
}

/// Byte comparison whose running time does not depend on where inputs differ
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Keypad entry buffer, bounded to four digits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinBuffer {
    digits: String,
}

impl PinBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a digit. Presses past the fourth digit are dropped.
    pub fn push_digit(&mut self, digit: u8) -> Result<bool> {
        if digit > 9 {
            return Err(Error::validation(format!("{} is not a keypad digit", digit)));
        }
        if self.digits.len() >= PATTERN_LENGTH {
            return Ok(false);
        }
        self.digits.push(char::from(b'0' + digit));
        Ok(true)
    }

    /// Replace the buffer with a full entry
    pub fn fill(&mut self, entered: &str) -> Result<()> {
        self.clear();
        if entered.chars().count() > PATTERN_LENGTH {
            return Err(Error::validation("PIN must be exactly 4 digits."));
        }
        for ch in entered.chars() {
            let digit = ch
                .to_digit(10)
                .ok_or_else(|| Error::validation("PIN must contain only digits."))?;
            self.push_digit(digit as u8)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Enter is only accepted with a full PIN
    pub fn is_ready(&self) -> bool {
        self.digits.len() == PATTERN_LENGTH
    }

    /// One asterisk per entered digit
    pub fn masked(&self) -> String {
        "*".repeat(self.digits.len())
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }
}
