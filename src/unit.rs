//! Blood unit records and their custody events
use crate::clock::TimeStamp;
use crate::error::CustodyError;
use crate::identity::Identity;
use chrono::Utc;
use std::{fmt, str::FromStr};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BloodType {
    #[n(0)]
    APositive,
    #[n(1)]
    ANegative,
    #[n(2)]
    BPositive,
    #[n(3)]
    BNegative,
    #[n(4)]
    ABPositive,
    #[n(5)]
    ABNegative,
    #[n(6)]
    OPositive,
    #[n(7)]
    ONegative,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::ABPositive,
        BloodType::ABNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    /// Maps the wire ordinal `0..=7` onto a blood type.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, CustodyError> {
        Self::ALL
            .get(usize::from(ordinal))
            .copied()
            .ok_or_else(|| {
                CustodyError::InvalidInput(format!("blood type ordinal {ordinal} is not in 0..=7"))
            })
    }
    pub fn ordinal(&self) -> u8 {
        match self {
            BloodType::APositive => 0,
            BloodType::ANegative => 1,
            BloodType::BPositive => 2,
            BloodType::BNegative => 3,
            BloodType::ABPositive => 4,
            BloodType::ABNegative => 5,
            BloodType::OPositive => 6,
            BloodType::ONegative => 7,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::ABPositive => "AB+",
            BloodType::ABNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == wanted)
            .ok_or_else(|| CustodyError::InvalidInput(format!("unknown blood type {s:?}")))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Requested,
    // terminal for the request/approve handshake
    #[n(2)]
    InTransit,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitStatus::Available => "available",
            UnitStatus::Requested => "requested",
            UnitStatus::InTransit => "in transit",
        };
        f.write_str(name)
    }
}

/// Snapshot of one donation. Records are only replaced through the ledger.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BloodUnit {
    #[n(0)]
    pub unit_id: u64,
    #[n(1)]
    pub donor_name: String,
    #[n(2)]
    pub blood_type: BloodType,
    #[n(3)]
    pub donation_date: TimeStamp<Utc>,
    #[n(4)]
    pub expiry_date: TimeStamp<Utc>,
    #[n(5)]
    pub status: UnitStatus,
    #[n(6)]
    pub current_owner: Identity,
    #[n(7)]
    pub requested_by: Option<Identity>,
}

impl BloodUnit {
    /// Informational only, expiry never changes the status.
    pub fn is_expired(&self, now: &TimeStamp<Utc>) -> bool {
        now.to_datetime_utc() > self.expiry_date.to_datetime_utc()
    }
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum CustodyEventKind {
    #[n(0)]
    Recorded {
        #[n(0)]
        owner: Identity,
    },
    #[n(1)]
    Requested {
        #[n(0)]
        hospital: Identity,
    },
    #[n(2)]
    Approved {
        #[n(0)]
        hospital: Identity,
    },
    #[n(3)]
    Withdrawn {
        #[n(0)]
        hospital: Identity,
    },
    #[n(4)]
    Rejected {
        #[n(0)]
        hospital: Identity,
    },
}

/// One entry in a unit's append-only custody trail.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct CustodyEvent {
    #[n(0)]
    pub unit_id: u64,
    #[n(1)]
    pub actor: Identity,
    #[n(2)]
    pub at: TimeStamp<Utc>,
    #[n(3)]
    pub kind: CustodyEventKind,
}

impl CustodyEvent {
    pub fn new(unit_id: u64, actor: Identity, at: TimeStamp<Utc>, kind: CustodyEventKind) -> Self {
        Self {
            unit_id,
            actor,
            at,
            kind,
        }
    }
}

impl fmt::Display for CustodyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CustodyEventKind::Recorded { owner } => {
                write!(f, "[{}] unit {} recorded by {owner}", self.at, self.unit_id)
            }
            CustodyEventKind::Requested { hospital } => {
                write!(f, "[{}] unit {} requested by {hospital}", self.at, self.unit_id)
            }
            CustodyEventKind::Approved { hospital } => write!(
                f,
                "[{}] unit {} released by {} to {hospital}",
                self.at, self.unit_id, self.actor
            ),
            CustodyEventKind::Withdrawn { hospital } => write!(
                f,
                "[{}] request for unit {} withdrawn by {hospital}",
                self.at, self.unit_id
            ),
            CustodyEventKind::Rejected { hospital } => write!(
                f,
                "[{}] request for unit {} from {hospital} rejected by {}",
                self.at, self.unit_id, self.actor
            ),
        }
    }
}
