use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Ethernet MAC address.
///
/// # Examples
/// ```
/// use astime_core::MacAddr;
///
/// let mac: MacAddr = "91:E0:F0:00:FE:01".parse().unwrap();
/// assert_eq!(mac.to_string(), "91:e0:f0:00:fe:01");
/// assert!(mac.is_multicast());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacParseError {
    #[error("expected 6 octets separated by ':' or '-', got {count}")]
    OctetCount { count: usize },
    #[error("invalid octet '{octet}'")]
    InvalidOctet { octet: String },
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(MacParseError::OctetCount { count: parts.len() });
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            let hex = part.bytes().all(|b| b.is_ascii_hexdigit());
            if part.is_empty() || part.len() > 2 || !hex {
                return Err(MacParseError::InvalidOctet {
                    octet: part.to_string(),
                });
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| MacParseError::InvalidOctet {
                octet: part.to_string(),
            })?;
        }
        Ok(Self(octets))
    }
}
