//! Ethernet MAC addresses.

use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet hardware address
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// ff:ff:ff:ff:ff:ff
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    /// Create a MAC address from its octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Group bit set (covers broadcast as well)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// All-ones address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Octets of the address
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| WireError::InvalidMac(s.to_string()))?;
            if part.len() != 2 {
                return Err(WireError::InvalidMac(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| WireError::InvalidMac(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(WireError::InvalidMac(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let mac: MacAddr = "00:1b:21:3a:4f:0c".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x1b, 0x21, 0x3a, 0x4f, 0x0c]);
        assert_eq!(mac.to_string(), "00:1b:21:3a:4f:0c");

        let dashed: MacAddr = "00-1B-21-3A-4F-0C".parse().unwrap();
        assert_eq!(dashed, mac);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("00:1b:21:3a:4f".parse::<MacAddr>().is_err());
        assert!("00:1b:21:3a:4f:0c:11".parse::<MacAddr>().is_err());
        assert!("zz:1b:21:3a:4f:0c".parse::<MacAddr>().is_err());
        assert!("".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_multicast_classification() {
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(MacAddr::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]).is_multicast());
        assert!(!MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]).is_multicast());
    }

    #[test]
    fn test_serde_as_string() {
        let mac = MacAddr::new([0, 0, 0, 0, 0, 0x0a]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00:00:00:00:00:0a\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }
}
