//! Durable key-value layout for the registry and the unit ledger
//!
//! `registry` holds the CBOR encoded role registry, `unit/<id>` each unit and
//! `history/<id>` each unit's custody events. Ids are big-endian so a prefix
//! scan walks units in ascending order.
use crate::error::{CustodyError, CustodyResult};
use crate::ledger::{UnitChange, UnitLedger};
use crate::registry::RoleRegistry;
use crate::unit::{BloodUnit, CustodyEvent};
use sled::{Batch, Db};
use std::sync::Arc;
use tracing::debug;

const REGISTRY_KEY: &[u8] = b"registry";
const UNIT_PREFIX: &[u8] = b"unit/";
const HISTORY_PREFIX: &[u8] = b"history/";

fn unit_key(unit_id: u64) -> Vec<u8> {
    [UNIT_PREFIX, unit_id.to_be_bytes().as_slice()].concat()
}

fn history_key(unit_id: u64) -> Vec<u8> {
    [HISTORY_PREFIX, unit_id.to_be_bytes().as_slice()].concat()
}

#[derive(Clone)]
pub struct CustodyStore {
    instance: Arc<Db>,
}

impl CustodyStore {
    pub fn new(instance: Arc<Db>) -> Self {
        Self { instance }
    }

    /// Writes the registry only if the store has none yet.
    pub fn initialize(&self, registry: &RoleRegistry) -> CustodyResult<()> {
        let encoded = minicbor::to_vec(registry)?;

        self.instance
            .compare_and_swap(REGISTRY_KEY, None::<&[u8]>, Some(encoded))?
            .map_err(|_| CustodyError::AlreadyInitialized)?;
        self.instance.flush()?;

        Ok(())
    }

    pub fn load_registry(&self) -> CustodyResult<Option<RoleRegistry>> {
        match self.instance.get(REGISTRY_KEY)? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_ledger(&self) -> CustodyResult<UnitLedger> {
        let mut records = Vec::new();

        for entry in self.instance.scan_prefix(UNIT_PREFIX) {
            let (_, value) = entry?;
            let unit: BloodUnit = minicbor::decode(&value)?;
            let events: Vec<CustodyEvent> = match self.instance.get(history_key(unit.unit_id))? {
                Some(bytes) => minicbor::decode(&bytes)?,
                None => {
                    return Err(CustodyError::Corrupt(format!(
                        "unit {} has no custody history",
                        unit.unit_id
                    )));
                }
            };
            records.push((unit, events));
        }

        debug!(units = records.len(), "loaded unit ledger");
        UnitLedger::from_records(records)
    }

    pub fn save_registry(&self, registry: &RoleRegistry) -> CustodyResult<()> {
        self.instance
            .insert(REGISTRY_KEY, minicbor::to_vec(registry)?)?;
        self.instance.flush()?;
        Ok(())
    }

    /// Writes the unit and its full trail in one batch.
    pub fn commit_unit(&self, change: &UnitChange, trail: &[CustodyEvent]) -> CustodyResult<()> {
        let unit_id = change.unit.unit_id;

        let mut batch = Batch::default();
        batch.insert(unit_key(unit_id), minicbor::to_vec(&change.unit)?);
        batch.insert(history_key(unit_id), minicbor::to_vec(trail)?);
        self.instance.apply_batch(batch)?;
        self.instance.flush()?;

        Ok(())
    }
}
