use std::fmt;

use super::address::Address;
use super::error::Ax25Error;

const CONTROL_UI: u8 = 0x03;
const PID_NO_LAYER3: u8 = 0xF0;
const ADDRESS_LEN: usize = 7;
const MAX_DIGIPEATERS: usize = 8;

/// An AX.25 UI frame as carried by APRS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub source: Address,
    pub dest: Address,
    pub path: Vec<Address>,
    pub body: String,
}

impl Frame {
    /// Encodes the frame as an AX.25 command frame (without FCS, which
    /// the TNC adds).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ADDRESS_LEN * (2 + self.path.len()) + 2 + self.body.len());
        self.dest.encode_into(&mut out, true, false);
        self.source.encode_into(&mut out, false, self.path.is_empty());
        for (i, digi) in self.path.iter().enumerate() {
            digi.encode_into(&mut out, false, i + 1 == self.path.len());
        }
        out.push(CONTROL_UI);
        out.push(PID_NO_LAYER3);
        out.extend_from_slice(self.body.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Ax25Error> {
        if bytes.len() < ADDRESS_LEN * 2 + 2 {
            return Err(Ax25Error::FrameTooShort(bytes.len()));
        }

        let mut addresses = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = bytes
                .get(offset..offset + ADDRESS_LEN)
                .ok_or(Ax25Error::UnterminatedAddress)?;
            let (address, _, last) = Address::decode(chunk)?;
            addresses.push(address);
            offset += ADDRESS_LEN;
            if last {
                break;
            }
            if addresses.len() > MAX_DIGIPEATERS + 2 {
                return Err(Ax25Error::TooManyDigipeaters(addresses.len() - 2));
            }
        }
        if addresses.len() < 2 {
            return Err(Ax25Error::UnterminatedAddress);
        }

        let (control, pid) = match bytes.get(offset..offset + 2) {
            Some(&[control, pid]) => (control, pid),
            _ => return Err(Ax25Error::FrameTooShort(bytes.len())),
        };
        if control & 0xEF != CONTROL_UI || pid != PID_NO_LAYER3 {
            return Err(Ax25Error::NotUiFrame { control, pid });
        }

        let mut addresses = addresses.into_iter();
        let dest = addresses.next().ok_or(Ax25Error::UnterminatedAddress)?;
        let source = addresses.next().ok_or(Ax25Error::UnterminatedAddress)?;

        Ok(Frame {
            source,
            dest,
            path: addresses.collect(),
            body: String::from_utf8_lossy(&bytes[offset + 2..])
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        })
    }
}

/// TNC2 monitor format: `SRC>DEST,PATH1,PATH2:body`
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.source, self.dest)?;
        for digi in &self.path {
            write!(f, ",{}", digi)?;
        }
        write!(f, ":{}", self.body)
    }
}
