//! Permissioned custody ledger for blood units.
//!
//! Banks record donations, hospitals request them, and the owning bank
//! approves the hand-over. Every call goes through [`engine::CustodyEngine`],
//! which checks the caller against the [`registry::RoleRegistry`] before
//! touching the [`ledger::UnitLedger`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod unit;

pub use engine::{CustodyEngine, Operation, Outcome};
pub use error::{CustodyError, CustodyResult, Role};
pub use identity::Identity;
pub use unit::{BloodType, BloodUnit, CustodyEvent, CustodyEventKind, UnitStatus};
