//! Engine facade: the single entry point for every custody operation
//!
//! Registry and ledger live together behind one lock. A mutation holds the
//! write guard while it validates, persists and publishes, so readers only
//! ever see whole operations.
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{CustodyError, CustodyResult};
use crate::identity::Identity;
use crate::ledger::{UnitChange, UnitLedger};
use crate::protocol;
use crate::registry::{RegistryRole, RoleRegistry};
use crate::store::CustodyStore;
use crate::unit::{BloodType, BloodUnit, CustodyEvent};
use sled::Db;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Everything a caller can ask of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Initialize { admin: Identity },
    AddBank(Identity),
    AddHospital(Identity),
    Admin,
    IsAdmin(Identity),
    IsBank(Identity),
    IsHospital(Identity),
    Banks,
    Hospitals,
    CreateUnit { donor_name: String, blood_type: u8 },
    GetUnit(u64),
    ListAvailable,
    UnitCount,
    UnitHistory(u64),
    RequestUnit(u64),
    ApproveTransfer { unit_id: u64, hospital: Identity },
    WithdrawRequest(u64),
    RejectRequest(u64),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Initialize { .. } => "initialize",
            Operation::AddBank(_) => "add_bank",
            Operation::AddHospital(_) => "add_hospital",
            Operation::Admin => "admin",
            Operation::IsAdmin(_) => "is_admin",
            Operation::IsBank(_) => "is_bank",
            Operation::IsHospital(_) => "is_hospital",
            Operation::Banks => "banks",
            Operation::Hospitals => "hospitals",
            Operation::CreateUnit { .. } => "create_unit",
            Operation::GetUnit(_) => "get_unit",
            Operation::ListAvailable => "list_available",
            Operation::UnitCount => "unit_count",
            Operation::UnitHistory(_) => "unit_history",
            Operation::RequestUnit(_) => "request_unit",
            Operation::ApproveTransfer { .. } => "approve_transfer",
            Operation::WithdrawRequest(_) => "withdraw_request",
            Operation::RejectRequest(_) => "reject_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Flag(bool),
    Identity(Identity),
    Identities(Vec<Identity>),
    UnitId(u64),
    Count(u64),
    Unit(BloodUnit),
    Units(Vec<BloodUnit>),
    History(Vec<CustodyEvent>),
}

#[derive(minicbor::Encode, Debug)]
struct CustodyState {
    #[n(0)]
    registry: RoleRegistry,
    #[n(1)]
    ledger: UnitLedger,
}

pub struct CustodyEngine {
    state: RwLock<CustodyState>,
    store: CustodyStore,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl CustodyEngine {
    /// Creates a fresh registry with `admin` in an empty store.
    ///
    /// Fails with `AlreadyInitialized` if the store already holds one, and
    /// with `InvalidInput` if `config` does not pass [`EngineConfig::validate`].
    pub fn initialize(
        instance: Arc<Db>,
        admin: Identity,
        config: EngineConfig,
    ) -> CustodyResult<Self> {
        config.validate()?;
        let store = CustodyStore::new(instance);
        let registry = RoleRegistry::initialize(admin);
        store.initialize(&registry)?;
        let ledger = store.load_ledger()?;

        info!(admin = %admin, "custody registry initialized");
        Ok(Self::assemble(store, registry, ledger, config))
    }

    /// Reopens a store written by an earlier `initialize`.
    pub fn open(instance: Arc<Db>, config: EngineConfig) -> CustodyResult<Self> {
        config.validate()?;
        let store = CustodyStore::new(instance);
        let registry = store.load_registry()?.ok_or(CustodyError::NotInitialized)?;
        let ledger = store.load_ledger()?;

        info!(
            admin = %registry.admin(),
            units = ledger.unit_count(),
            "custody registry reopened"
        );
        Ok(Self::assemble(store, registry, ledger, config))
    }

    fn assemble(
        store: CustodyStore,
        registry: RoleRegistry,
        ledger: UnitLedger,
        config: EngineConfig,
    ) -> Self {
        Self {
            state: RwLock::new(CustodyState { registry, ledger }),
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // A panic mid-operation happens before anything is applied, so a
    // poisoned lock still guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, CustodyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
    fn write(&self) -> RwLockWriteGuard<'_, CustodyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches one caller-tagged operation.
    pub fn execute(&self, caller: &Identity, operation: Operation) -> CustodyResult<Outcome> {
        let name = operation.name();

        let result = match operation {
            Operation::Initialize { .. } => Err(CustodyError::AlreadyInitialized),
            Operation::AddBank(identity) => self.add_bank(caller, identity).map(|_| Outcome::Done),
            Operation::AddHospital(identity) => {
                self.add_hospital(caller, identity).map(|_| Outcome::Done)
            }
            Operation::Admin => Ok(Outcome::Identity(self.admin())),
            Operation::IsAdmin(identity) => Ok(Outcome::Flag(self.is_admin(&identity))),
            Operation::IsBank(identity) => Ok(Outcome::Flag(self.is_bank(&identity))),
            Operation::IsHospital(identity) => Ok(Outcome::Flag(self.is_hospital(&identity))),
            Operation::Banks => Ok(Outcome::Identities(self.banks())),
            Operation::Hospitals => Ok(Outcome::Identities(self.hospitals())),
            Operation::CreateUnit {
                donor_name,
                blood_type,
            } => self
                .create_unit(caller, &donor_name, blood_type)
                .map(Outcome::UnitId),
            Operation::GetUnit(unit_id) => self.get_unit(unit_id).map(Outcome::Unit),
            Operation::ListAvailable => Ok(Outcome::Units(self.list_available())),
            Operation::UnitCount => Ok(Outcome::Count(self.unit_count())),
            Operation::UnitHistory(unit_id) => self.unit_history(unit_id).map(Outcome::History),
            Operation::RequestUnit(unit_id) => {
                self.request_unit(caller, unit_id).map(|_| Outcome::Done)
            }
            Operation::ApproveTransfer { unit_id, hospital } => self
                .approve_transfer(caller, unit_id, &hospital)
                .map(|_| Outcome::Done),
            Operation::WithdrawRequest(unit_id) => {
                self.withdraw_request(caller, unit_id).map(|_| Outcome::Done)
            }
            Operation::RejectRequest(unit_id) => {
                self.reject_request(caller, unit_id).map(|_| Outcome::Done)
            }
        };

        if let Err(error) = &result {
            if error.is_rejection() {
                debug!(caller = %caller, operation = name, %error, "operation rejected");
            } else {
                warn!(caller = %caller, operation = name, %error, "operation failed");
            }
        }

        result
    }

    pub fn add_bank(&self, caller: &Identity, identity: Identity) -> CustodyResult<()> {
        let mut state = self.write();
        let mut registry = state.registry.clone();

        if registry.add_bank(caller, identity)? {
            self.store.save_registry(&registry)?;
            state.registry = registry;
            info!(bank = %identity, "bank registered");
        }

        Ok(())
    }

    pub fn add_hospital(&self, caller: &Identity, identity: Identity) -> CustodyResult<()> {
        let mut state = self.write();
        let mut registry = state.registry.clone();

        if registry.add_hospital(caller, identity)? {
            self.store.save_registry(&registry)?;
            state.registry = registry;
            info!(hospital = %identity, "hospital registered");
        }

        Ok(())
    }

    pub fn admin(&self) -> Identity {
        *self.read().registry.admin()
    }
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.read().registry.is_admin(identity)
    }
    pub fn is_bank(&self, identity: &Identity) -> bool {
        self.read().registry.is_bank(identity)
    }
    pub fn is_hospital(&self, identity: &Identity) -> bool {
        self.read().registry.is_hospital(identity)
    }
    pub fn banks(&self) -> Vec<Identity> {
        self.read().registry.banks().copied().collect()
    }
    pub fn hospitals(&self) -> Vec<Identity> {
        self.read().registry.hospitals().copied().collect()
    }

    /// Records a donation owned by the calling bank and returns its id.
    ///
    /// `blood_type` is the wire ordinal `0..=7`, see [`BloodType::from_ordinal`].
    pub fn create_unit(
        &self,
        caller: &Identity,
        donor_name: &str,
        blood_type: u8,
    ) -> CustodyResult<u64> {
        let mut state = self.write();
        state.registry.require(caller, RegistryRole::Bank)?;

        self.validate_donor_name(donor_name)?;
        let blood_type = BloodType::from_ordinal(blood_type)?;

        let donation_date = self.clock.now();
        let expiry_date = donation_date
            .checked_add(self.config.shelf_life)
            .ok_or_else(|| CustodyError::InvalidInput("expiry date is out of range".into()))?;

        let change = state.ledger.draft_unit(
            *caller,
            donor_name.to_string(),
            blood_type,
            donation_date,
            expiry_date,
        );
        let unit_id = change.unit.unit_id;
        self.commit(&mut state, change)?;

        info!(unit_id, bank = %caller, %blood_type, "blood unit recorded");
        Ok(unit_id)
    }

    fn validate_donor_name(&self, donor_name: &str) -> CustodyResult<()> {
        if donor_name.trim().is_empty() {
            return Err(CustodyError::InvalidInput("donor name is empty".into()));
        }
        let length = donor_name.chars().count();
        if length > self.config.max_donor_name {
            return Err(CustodyError::InvalidInput(format!(
                "donor name is {length} characters, the limit is {}",
                self.config.max_donor_name
            )));
        }
        Ok(())
    }

    pub fn get_unit(&self, unit_id: u64) -> CustodyResult<BloodUnit> {
        self.read().ledger.get(unit_id).cloned()
    }

    pub fn list_available(&self) -> Vec<BloodUnit> {
        self.read().ledger.list_available()
    }

    pub fn unit_count(&self) -> u64 {
        self.read().ledger.unit_count()
    }

    pub fn unit_history(&self, unit_id: u64) -> CustodyResult<Vec<CustodyEvent>> {
        self.read().ledger.history(unit_id).map(<[CustodyEvent]>::to_vec)
    }

    pub fn request_unit(&self, caller: &Identity, unit_id: u64) -> CustodyResult<()> {
        let mut state = self.write();
        let change = protocol::request_unit(
            &state.registry,
            &state.ledger,
            caller,
            unit_id,
            self.clock.now(),
        )?;
        self.commit(&mut state, change)?;

        info!(unit_id, hospital = %caller, "blood unit requested");
        Ok(())
    }

    pub fn approve_transfer(
        &self,
        caller: &Identity,
        unit_id: u64,
        hospital: &Identity,
    ) -> CustodyResult<()> {
        let mut state = self.write();
        let change = protocol::approve_transfer(
            &state.registry,
            &state.ledger,
            caller,
            unit_id,
            hospital,
            self.clock.now(),
        )?;
        self.commit(&mut state, change)?;

        info!(unit_id, bank = %caller, hospital = %hospital, "blood unit released");
        Ok(())
    }

    pub fn withdraw_request(&self, caller: &Identity, unit_id: u64) -> CustodyResult<()> {
        let mut state = self.write();
        let change = protocol::withdraw_request(&state.ledger, caller, unit_id, self.clock.now())?;
        self.commit(&mut state, change)?;

        info!(unit_id, hospital = %caller, "request withdrawn");
        Ok(())
    }

    pub fn reject_request(&self, caller: &Identity, unit_id: u64) -> CustodyResult<()> {
        let mut state = self.write();
        let change = protocol::reject_request(
            &state.registry,
            &state.ledger,
            caller,
            unit_id,
            self.clock.now(),
        )?;
        self.commit(&mut state, change)?;

        info!(unit_id, bank = %caller, "request rejected");
        Ok(())
    }

    /// SHA-256 over the CBOR encoding of registry and ledger.
    pub fn state_digest(&self) -> CustodyResult<String> {
        let state = self.read();
        let contents = minicbor::to_vec(&*state)?;

        Ok(sha256::digest(&contents))
    }

    // persist first, then publish
    fn commit(&self, state: &mut CustodyState, change: UnitChange) -> CustodyResult<()> {
        let trail = state.ledger.history_with(&change);
        self.store.commit_unit(&change, &trail)?;
        state.ledger.apply(change)
    }
}
