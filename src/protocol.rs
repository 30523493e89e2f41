//! Request/approve handshake over the unit ledger
//!
//! Each transition reads the current record from the ledger, checks the
//! caller and the unit's status, and returns the successor record as a
//! [`UnitChange`]. Nothing here mutates the ledger; the engine persists the
//! change and applies it.
//!
//! ```text
//! Available --request_unit--> Requested --approve_transfer--> InTransit
//!     ^                           |
//!     +--withdraw / reject--------+
//! ```
use crate::clock::TimeStamp;
use crate::error::{CustodyError, CustodyResult, Role};
use crate::identity::Identity;
use crate::ledger::{UnitChange, UnitLedger};
use crate::registry::{RegistryRole, RoleRegistry};
use crate::unit::{BloodUnit, CustodyEvent, CustodyEventKind, UnitStatus};
use chrono::Utc;

/// A hospital marks an available unit as wanted.
pub fn request_unit(
    registry: &RoleRegistry,
    ledger: &UnitLedger,
    caller: &Identity,
    unit_id: u64,
    now: TimeStamp<Utc>,
) -> CustodyResult<UnitChange> {
    registry.require(caller, RegistryRole::Hospital)?;
    let unit = ledger.get(unit_id)?;

    match unit.status {
        UnitStatus::Available => {}
        UnitStatus::Requested | UnitStatus::InTransit => {
            return Err(invalid_state(unit));
        }
    }

    let mut next = unit.clone();
    next.status = UnitStatus::Requested;
    next.requested_by = Some(*caller);

    Ok(UnitChange {
        unit: next,
        event: CustodyEvent::new(
            unit_id,
            *caller,
            now,
            CustodyEventKind::Requested { hospital: *caller },
        ),
    })
}

/// The owning bank hands a requested unit over to the hospital that asked for it.
pub fn approve_transfer(
    registry: &RoleRegistry,
    ledger: &UnitLedger,
    caller: &Identity,
    unit_id: u64,
    hospital: &Identity,
    now: TimeStamp<Utc>,
) -> CustodyResult<UnitChange> {
    let unit = ledger.get(unit_id)?;
    require_custodian(registry, unit, caller)?;

    let requester = pending_requester(unit)?;
    if requester != *hospital {
        return Err(CustodyError::MismatchedRequester {
            unit_id,
            hospital: *hospital,
            requested_by: Some(requester),
        });
    }

    let mut next = unit.clone();
    next.status = UnitStatus::InTransit;
    next.current_owner = *hospital;
    next.requested_by = None;

    Ok(UnitChange {
        unit: next,
        event: CustodyEvent::new(
            unit_id,
            *caller,
            now,
            CustodyEventKind::Approved {
                hospital: *hospital,
            },
        ),
    })
}

/// The requesting hospital takes its request back.
pub fn withdraw_request(
    ledger: &UnitLedger,
    caller: &Identity,
    unit_id: u64,
    now: TimeStamp<Utc>,
) -> CustodyResult<UnitChange> {
    let unit = ledger.get(unit_id)?;
    let requester = pending_requester(unit)?;

    if requester != *caller {
        return Err(CustodyError::Unauthorized {
            caller: *caller,
            required: Role::Requester,
        });
    }

    Ok(UnitChange {
        unit: reopen(unit),
        event: CustodyEvent::new(
            unit_id,
            *caller,
            now,
            CustodyEventKind::Withdrawn {
                hospital: requester,
            },
        ),
    })
}

/// The owning bank turns a request down and puts the unit back on the shelf.
pub fn reject_request(
    registry: &RoleRegistry,
    ledger: &UnitLedger,
    caller: &Identity,
    unit_id: u64,
    now: TimeStamp<Utc>,
) -> CustodyResult<UnitChange> {
    let unit = ledger.get(unit_id)?;
    require_custodian(registry, unit, caller)?;
    let requester = pending_requester(unit)?;

    Ok(UnitChange {
        unit: reopen(unit),
        event: CustodyEvent::new(
            unit_id,
            *caller,
            now,
            CustodyEventKind::Rejected {
                hospital: requester,
            },
        ),
    })
}

// caller must be a registered bank that currently holds the unit
fn require_custodian(
    registry: &RoleRegistry,
    unit: &BloodUnit,
    caller: &Identity,
) -> CustodyResult<()> {
    if registry.is_bank(caller) && unit.current_owner == *caller {
        return Ok(());
    }

    Err(CustodyError::Unauthorized {
        caller: *caller,
        required: Role::OwningBank,
    })
}

fn pending_requester(unit: &BloodUnit) -> CustodyResult<Identity> {
    match (unit.status, unit.requested_by) {
        (UnitStatus::Requested, Some(requester)) => Ok(requester),
        (UnitStatus::Requested, None) => Err(CustodyError::Corrupt(format!(
            "unit {} is requested without a requester",
            unit.unit_id
        ))),
        (UnitStatus::Available | UnitStatus::InTransit, _) => Err(invalid_state(unit)),
    }
}

fn reopen(unit: &BloodUnit) -> BloodUnit {
    let mut next = unit.clone();
    next.status = UnitStatus::Available;
    next.requested_by = None;
    next
}

fn invalid_state(unit: &BloodUnit) -> CustodyError {
    CustodyError::InvalidState {
        unit_id: unit.unit_id,
        status: unit.status,
    }
}
