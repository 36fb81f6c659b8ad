use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::Ax25Error;

pub const MAX_CALLSIGN_LEN: usize = 6;
pub const MAX_SSID: u8 = 15;

/// Station identifier: callsign plus secondary station id.
///
/// Callsigns are normalized to upper case, so `kf7fvh-1` and `KF7FVH-1` are
/// the same station. An SSID of zero is rendered without a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    callsign: String,
    ssid: u8,
}

impl Address {
    pub fn new(callsign: &str, ssid: u8) -> Result<Self, Ax25Error> {
        let callsign = callsign.trim().to_ascii_uppercase();
        if callsign.is_empty() {
            return Err(Ax25Error::EmptyCallsign);
        }
        if callsign.len() > MAX_CALLSIGN_LEN {
            return Err(Ax25Error::CallsignTooLong(callsign));
        }
        if !callsign.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Ax25Error::InvalidCallsign(callsign));
        }
        if ssid > MAX_SSID {
            return Err(Ax25Error::InvalidSsid(ssid.to_string()));
        }
        Ok(Self { callsign, ssid })
    }

    /// For compile-time constants that are known to be valid.
    pub(crate) fn fixed(callsign: &str, ssid: u8) -> Self {
        Self {
            callsign: callsign.to_string(),
            ssid,
        }
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Encodes the 7-byte on-air address. `flag` is the C/H bit (bit 7 of
    /// the SSID octet), `last` marks the end of the address field.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>, flag: bool, last: bool) {
        let mut padded = [b' '; MAX_CALLSIGN_LEN];
        padded[..self.callsign.len()].copy_from_slice(self.callsign.as_bytes());
        out.extend(padded.iter().map(|b| b << 1));

        let mut ssid_octet = 0x60 | (self.ssid << 1);
        if flag {
            ssid_octet |= 0x80;
        }
        if last {
            ssid_octet |= 0x01;
        }
        out.push(ssid_octet);
    }

    /// Decodes a 7-byte on-air address, returning the address, the C/H bit
    /// and the end-of-address bit.
    pub(crate) fn decode(bytes: &[u8]) -> Result<(Self, bool, bool), Ax25Error> {
        if bytes.len() < 7 {
            return Err(Ax25Error::FrameTooShort(bytes.len()));
        }
        let callsign: String = bytes[..MAX_CALLSIGN_LEN]
            .iter()
            .map(|b| (b >> 1) as char)
            .collect();
        let ssid_octet = bytes[6];
        let address = Address::new(callsign.trim_end(), (ssid_octet >> 1) & 0x0F)?;
        Ok((address, ssid_octet & 0x80 != 0, ssid_octet & 0x01 != 0))
    }
}

impl FromStr for Address {
    type Err = Ax25Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid = ssid
                    .parse::<u8>()
                    .map_err(|_| Ax25Error::InvalidSsid(ssid.to_string()))?;
                Address::new(call, ssid)
            }
            None => Address::new(s, 0),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign)
        } else {
            write!(f, "{}-{}", self.callsign, self.ssid)
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes() {
        let addr: Address = "kf7fvh-1".parse().unwrap();
        assert_eq!(addr.callsign(), "KF7FVH");
        assert_eq!(addr.ssid(), 1);
        assert_eq!(addr.to_string(), "KF7FVH-1");
    }

    #[test]
    fn zero_ssid_has_no_suffix() {
        let a: Address = "APZ001-0".parse().unwrap();
        let b: Address = "APZ001".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "APZ001");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            "TOOLONGCALL".parse::<Address>(),
            Err(Ax25Error::CallsignTooLong("TOOLONGCALL".into()))
        );
        assert!("NW5W-16".parse::<Address>().is_err());
        assert!("NW5W-x".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
        assert!("N/5W".parse::<Address>().is_err());
    }

    #[test]
    fn wire_format() {
        let addr: Address = "WIDE2-1".parse().unwrap();
        let mut out = Vec::new();
        addr.encode_into(&mut out, false, true);
        assert_eq!(out, vec![b'W' << 1, b'I' << 1, b'D' << 1, b'E' << 1, b'2' << 1, b' ' << 1, 0x63]);

        let (decoded, flag, last) = Address::decode(&out).unwrap();
        assert_eq!(decoded, addr);
        assert!(!flag);
        assert!(last);
    }
}
