//! Participant handles
use crate::error::CustodyError;
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, Hrp};
use std::{fmt, str::FromStr};
use uuid7::uuid7;

pub const IDENTITY_LEN: usize = 16;

// human readable part used when rendering an identity as text
const ADDRESS_HRP: Hrp = Hrp::parse_unchecked("addr");

/// Opaque fixed-length handle for an admin, bank or hospital.
///
/// The text form is a bech32m string prefixed with `addr`. Ordering exists
/// only so registries iterate and encode deterministically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// A fresh handle built from a time-ordered uuid.
    pub fn generate() -> Self {
        Self(*uuid7().as_bytes())
    }
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
    pub fn to_address(&self) -> Result<String, bech32::EncodeError> {
        bech32::encode::<Bech32m>(ADDRESS_HRP, &self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.to_address().map_err(|_| fmt::Error)?;
        f.write_str(&address)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl FromStr for Identity {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let checked = CheckedHrpstring::new::<Bech32m>(s)
            .map_err(|e| CustodyError::InvalidInput(format!("malformed address {s:?}: {e}")))?;

        let hrp = checked.hrp();
        if hrp != ADDRESS_HRP {
            return Err(CustodyError::InvalidInput(format!(
                "address {s:?} has prefix {hrp}, expected {ADDRESS_HRP}"
            )));
        }

        let data: Vec<u8> = checked.byte_iter().collect();
        let bytes: [u8; IDENTITY_LEN] = data.try_into().map_err(|data: Vec<u8>| {
            CustodyError::InvalidInput(format!(
                "address {s:?} holds {} bytes, expected {IDENTITY_LEN}",
                data.len()
            ))
        })?;

        Ok(Self(bytes))
    }
}

impl<C> minicbor::Encode<C> for Identity {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Identity {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;

        bytes
            .try_into()
            .map(Identity)
            .map_err(|_| minicbor::decode::Error::message("identity must be 16 bytes"))
    }
}
