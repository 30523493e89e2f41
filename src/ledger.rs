//! Unit ledger: every blood unit ever recorded, indexed by its id
use crate::clock::TimeStamp;
use crate::error::{CustodyError, CustodyResult};
use crate::identity::Identity;
use crate::unit::{BloodType, BloodUnit, CustodyEvent, CustodyEventKind, UnitStatus};
use chrono::Utc;

/// A validated successor record for one unit plus the event explaining it.
///
/// Changes are computed against a snapshot, persisted, and only then handed
/// to [`UnitLedger::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitChange {
    pub unit: BloodUnit,
    pub event: CustodyEvent,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, PartialEq, Eq)]
pub struct UnitLedger {
    // index == unit_id
    #[n(0)]
    units: Vec<BloodUnit>,
    #[n(1)]
    history: Vec<Vec<CustodyEvent>>,
}

impl UnitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored records, checking ids are contiguous from 0.
    pub fn from_records(records: Vec<(BloodUnit, Vec<CustodyEvent>)>) -> CustodyResult<Self> {
        let mut ledger = Self::new();

        for (position, (unit, events)) in records.into_iter().enumerate() {
            if unit.unit_id != position as u64 {
                return Err(CustodyError::Corrupt(format!(
                    "expected unit {position}, found unit {}",
                    unit.unit_id
                )));
            }
            if let Some(stray) = events.iter().find(|event| event.unit_id != unit.unit_id) {
                return Err(CustodyError::Corrupt(format!(
                    "history of unit {} holds an event for unit {}",
                    unit.unit_id, stray.unit_id
                )));
            }
            ledger.units.push(unit);
            ledger.history.push(events);
        }

        Ok(ledger)
    }

    pub fn unit_count(&self) -> u64 {
        self.units.len() as u64
    }
    pub fn next_unit_id(&self) -> u64 {
        self.unit_count()
    }

    pub fn get(&self, unit_id: u64) -> CustodyResult<&BloodUnit> {
        usize::try_from(unit_id)
            .ok()
            .and_then(|index| self.units.get(index))
            .ok_or(CustodyError::NotFound(unit_id))
    }

    pub fn history(&self, unit_id: u64) -> CustodyResult<&[CustodyEvent]> {
        usize::try_from(unit_id)
            .ok()
            .and_then(|index| self.history.get(index))
            .map(Vec::as_slice)
            .ok_or(CustodyError::NotFound(unit_id))
    }

    /// The unit's trail as it will read once `change` is applied.
    pub fn history_with(&self, change: &UnitChange) -> Vec<CustodyEvent> {
        let mut trail = self
            .history(change.unit.unit_id)
            .map(<[CustodyEvent]>::to_vec)
            .unwrap_or_default();
        trail.push(change.event.clone());
        trail
    }

    /// All units still `Available`, ascending by id.
    pub fn list_available(&self) -> Vec<BloodUnit> {
        self.units
            .iter()
            .filter(|unit| unit.status == UnitStatus::Available)
            .cloned()
            .collect()
    }

    pub fn units(&self) -> &[BloodUnit] {
        &self.units
    }

    /// Drafts the record for the next unit. Nothing is stored until `apply`.
    pub fn draft_unit(
        &self,
        owner: Identity,
        donor_name: String,
        blood_type: BloodType,
        donation_date: TimeStamp<Utc>,
        expiry_date: TimeStamp<Utc>,
    ) -> UnitChange {
        let unit_id = self.next_unit_id();
        let event = CustodyEvent::new(
            unit_id,
            owner,
            donation_date.clone(),
            CustodyEventKind::Recorded { owner },
        );
        let unit = BloodUnit {
            unit_id,
            donor_name,
            blood_type,
            donation_date,
            expiry_date,
            status: UnitStatus::Available,
            current_owner: owner,
            requested_by: None,
        };

        UnitChange { unit, event }
    }

    /// Stores a change: appends a drafted unit or replaces an existing one.
    pub fn apply(&mut self, change: UnitChange) -> CustodyResult<()> {
        let UnitChange { unit, event } = change;
        let unit_id = unit.unit_id;

        if unit_id == self.next_unit_id() {
            self.units.push(unit);
            self.history.push(vec![event]);
            return Ok(());
        }

        let index = usize::try_from(unit_id).map_err(|_| CustodyError::NotFound(unit_id))?;
        match (self.units.get_mut(index), self.history.get_mut(index)) {
            (Some(slot), Some(trail)) => {
                *slot = unit;
                trail.push(event);
                Ok(())
            }
            _ => Err(CustodyError::NotFound(unit_id)),
        }
    }
}
