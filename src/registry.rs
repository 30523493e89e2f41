//! Role registry: one admin and the insertion-only bank and hospital sets
use crate::error::{CustodyError, CustodyResult, Role};
use crate::identity::Identity;
use std::collections::BTreeSet;

/// Roles held registry-wide, independent of any unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRole {
    Admin,
    Bank,
    Hospital,
}

impl From<RegistryRole> for Role {
    fn from(role: RegistryRole) -> Self {
        match role {
            RegistryRole::Admin => Role::Admin,
            RegistryRole::Bank => Role::Bank,
            RegistryRole::Hospital => Role::Hospital,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    #[n(0)]
    admin: Identity,
    #[n(1)]
    banks: BTreeSet<Identity>,
    #[n(2)]
    hospitals: BTreeSet<Identity>,
}

impl RoleRegistry {
    /// The admin is fixed here and never changes afterwards.
    pub fn initialize(admin: Identity) -> Self {
        Self {
            admin,
            banks: BTreeSet::new(),
            hospitals: BTreeSet::new(),
        }
    }
    pub fn admin(&self) -> &Identity {
        &self.admin
    }
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admin == *identity
    }
    pub fn is_bank(&self, identity: &Identity) -> bool {
        self.banks.contains(identity)
    }
    pub fn is_hospital(&self, identity: &Identity) -> bool {
        self.hospitals.contains(identity)
    }
    pub fn banks(&self) -> impl Iterator<Item = &Identity> {
        self.banks.iter()
    }
    pub fn hospitals(&self) -> impl Iterator<Item = &Identity> {
        self.hospitals.iter()
    }

    /// Registers a bank. Returns false when it was already registered.
    pub fn add_bank(&mut self, caller: &Identity, identity: Identity) -> CustodyResult<bool> {
        self.require(caller, RegistryRole::Admin)?;
        Ok(self.banks.insert(identity))
    }

    /// Registers a hospital. Returns false when it was already registered.
    pub fn add_hospital(&mut self, caller: &Identity, identity: Identity) -> CustodyResult<bool> {
        self.require(caller, RegistryRole::Admin)?;
        Ok(self.hospitals.insert(identity))
    }

    /// Fails with `Unauthorized` unless `caller` holds `role`.
    pub fn require(&self, caller: &Identity, role: RegistryRole) -> CustodyResult<()> {
        let allowed = match role {
            RegistryRole::Admin => self.is_admin(caller),
            RegistryRole::Bank => self.is_bank(caller),
            RegistryRole::Hospital => self.is_hospital(caller),
        };

        if allowed {
            Ok(())
        } else {
            Err(CustodyError::Unauthorized {
                caller: *caller,
                required: role.into(),
            })
        }
    }
}
