//! Smoke Screen Unit tests for blood custody components
//!
//! These test the building blocks in isolation from the engine and the
//! store. They mostly cover the happy path plus the obvious rejections.
//!

use blood_custody::{
    BloodType, CustodyError, CustodyEventKind, Identity, Role, UnitStatus,
    clock::{Clock, FixedClock, TimeStamp},
    config::EngineConfig,
    ledger::UnitLedger,
    protocol,
    registry::RoleRegistry,
};
use chrono::{TimeDelta, Utc};

fn at(day: u32) -> TimeStamp<Utc> {
    TimeStamp::new_with(2024, 6, day, 9, 0, 0).unwrap()
}

// IDENTITY TESTS
#[cfg(test)]
mod identity_tests {
    use super::*;

    /// Generated identities are unique
    #[test]
    fn generates_unique_ids() {
        let id1 = Identity::generate();
        let id2 = Identity::generate();
        let id3 = Identity::generate();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    /// Text form carries the addr prefix and parses back
    #[test]
    fn text_form_round_trips() {
        let id = Identity::from_bytes([42u8; 16]);
        let text = id.to_string();

        assert!(text.starts_with("addr1"));
        assert_eq!(text.parse::<Identity>().unwrap(), id);
    }

    /// Garbage is rejected as invalid input
    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "not-an-address".parse::<Identity>(),
            Err(CustodyError::InvalidInput(_))
        ));
    }
}

// UNIT TYPE TESTS
#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Wire ordinals follow A+, A-, B+, B-, AB+, AB-, O+, O-
    #[test]
    fn blood_type_ordinals() {
        assert_eq!(BloodType::from_ordinal(0).unwrap(), BloodType::APositive);
        assert_eq!(BloodType::from_ordinal(4).unwrap(), BloodType::ABPositive);
        assert_eq!(BloodType::from_ordinal(7).unwrap(), BloodType::ONegative);
        assert!(matches!(
            BloodType::from_ordinal(255),
            Err(CustodyError::InvalidInput(_))
        ));
    }

    /// Labels render the usual notation
    #[test]
    fn blood_type_labels() {
        assert_eq!(BloodType::APositive.to_string(), "A+");
        assert_eq!(BloodType::ABNegative.to_string(), "AB-");
        assert_eq!("o-".parse::<BloodType>().unwrap(), BloodType::ONegative);
    }

    /// TimeStamp CBOR encoding/decoding keeps nanosecond precision
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    /// Expiry is informational: the status does not move
    #[test]
    fn expired_units_are_still_available() {
        let bank = Identity::generate();
        let ledger = UnitLedger::new();
        let change = ledger.draft_unit(
            bank,
            "Test Donor".into(),
            BloodType::OPositive,
            at(1),
            at(10),
        );

        assert!(!change.unit.is_expired(&at(10)));
        assert!(change.unit.is_expired(&at(11)));
        assert_eq!(change.unit.status, UnitStatus::Available);
    }
}

// REGISTRY TESTS
#[cfg(test)]
mod registry_tests {
    use super::*;

    /// Only the admin may register banks and hospitals
    #[test]
    fn non_admin_cannot_register() {
        let admin = Identity::generate();
        let stranger = Identity::generate();
        let mut registry = RoleRegistry::initialize(admin);

        let result = registry.add_bank(&stranger, Identity::generate());
        assert!(matches!(
            result,
            Err(CustodyError::Unauthorized {
                required: Role::Admin,
                ..
            })
        ));

        let result = registry.add_hospital(&stranger, stranger);
        assert!(matches!(
            result,
            Err(CustodyError::Unauthorized {
                required: Role::Admin,
                caller,
            }) if caller == stranger
        ));
        assert!(!registry.is_hospital(&stranger));
    }

    /// Adding twice is a no-op success
    #[test]
    fn registration_is_idempotent() {
        let admin = Identity::generate();
        let bank = Identity::generate();
        let mut registry = RoleRegistry::initialize(admin);

        assert!(registry.add_bank(&admin, bank).unwrap());
        assert!(!registry.add_bank(&admin, bank).unwrap());
        assert_eq!(registry.banks().count(), 1);
    }

    /// Bank and hospital sets are independent
    #[test]
    fn roles_are_separate() {
        let admin = Identity::generate();
        let bank = Identity::generate();
        let mut registry = RoleRegistry::initialize(admin);
        registry.add_bank(&admin, bank).unwrap();

        assert!(registry.is_bank(&bank));
        assert!(!registry.is_hospital(&bank));
        assert!(!registry.is_admin(&bank));
    }
}

// LEDGER TESTS
#[cfg(test)]
mod ledger_tests {
    use super::*;

    /// Drafted units take the next id and land in stock once applied
    #[test]
    fn applied_drafts_get_sequential_ids() {
        let bank = Identity::generate();
        let mut ledger = UnitLedger::new();

        for expected in 0..3u64 {
            let change =
                ledger.draft_unit(bank, format!("Donor {expected}"), BloodType::BPositive, at(1), at(2));
            assert_eq!(change.unit.unit_id, expected);
            ledger.apply(change).unwrap();
        }

        assert_eq!(ledger.unit_count(), 3);
        let ids: Vec<u64> = ledger.list_available().iter().map(|u| u.unit_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    /// Drafting alone stores nothing
    #[test]
    fn drafts_are_not_stored() {
        let ledger = UnitLedger::new();
        let _ = ledger.draft_unit(Identity::generate(), "Donor".into(), BloodType::APositive, at(1), at(2));

        assert_eq!(ledger.unit_count(), 0);
        assert!(matches!(ledger.get(0), Err(CustodyError::NotFound(0))));
    }

    /// Records loaded from a store must be contiguous from zero
    #[test]
    fn from_records_rejects_gaps() {
        let bank = Identity::generate();
        let ledger = UnitLedger::new();
        let first = ledger.draft_unit(bank, "Donor".into(), BloodType::APositive, at(1), at(2));

        let mut gapped = first.clone();
        gapped.unit.unit_id = 5;
        gapped.event.unit_id = 5;

        let result = UnitLedger::from_records(vec![(gapped.unit, vec![gapped.event])]);
        assert!(matches!(result, Err(CustodyError::Corrupt(_))));

        let rebuilt = UnitLedger::from_records(vec![(first.unit.clone(), vec![first.event])]).unwrap();
        assert_eq!(rebuilt.get(0).unwrap(), &first.unit);
    }
}

// PROTOCOL TESTS
#[cfg(test)]
mod protocol_tests {
    use super::*;

    struct Setup {
        registry: RoleRegistry,
        ledger: UnitLedger,
        bank: Identity,
        hospital: Identity,
    }

    fn setup() -> Setup {
        let admin = Identity::generate();
        let bank = Identity::generate();
        let hospital = Identity::generate();

        let mut registry = RoleRegistry::initialize(admin);
        registry.add_bank(&admin, bank).unwrap();
        registry.add_hospital(&admin, hospital).unwrap();

        let mut ledger = UnitLedger::new();
        let change = ledger.draft_unit(bank, "Test Donor".into(), BloodType::APositive, at(1), at(20));
        ledger.apply(change).unwrap();

        Setup {
            registry,
            ledger,
            bank,
            hospital,
        }
    }

    /// Requesting marks the unit and names the hospital
    #[test]
    fn request_marks_unit() {
        let s = setup();

        let change = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 0, at(2)).unwrap();

        assert_eq!(change.unit.status, UnitStatus::Requested);
        assert_eq!(change.unit.requested_by, Some(s.hospital));
        assert_eq!(change.unit.current_owner, s.bank);
        assert_eq!(
            change.event.kind,
            CustodyEventKind::Requested {
                hospital: s.hospital
            }
        );
        // the ledger itself is untouched until the change is applied
        assert_eq!(s.ledger.get(0).unwrap().status, UnitStatus::Available);
    }

    /// Banks cannot request units
    #[test]
    fn bank_cannot_request() {
        let s = setup();

        let result = protocol::request_unit(&s.registry, &s.ledger, &s.bank, 0, at(2));
        assert!(matches!(
            result,
            Err(CustodyError::Unauthorized {
                required: Role::Hospital,
                ..
            })
        ));
    }

    /// Unknown units are reported as such
    #[test]
    fn request_unknown_unit() {
        let s = setup();

        let result = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 9, at(2));
        assert!(matches!(result, Err(CustodyError::NotFound(9))));
    }

    /// Approval moves custody to the requesting hospital
    #[test]
    fn approve_moves_custody() {
        let mut s = setup();
        let requested = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 0, at(2)).unwrap();
        s.ledger.apply(requested).unwrap();

        let approved =
            protocol::approve_transfer(&s.registry, &s.ledger, &s.bank, 0, &s.hospital, at(3)).unwrap();
        s.ledger.apply(approved).unwrap();

        let unit = s.ledger.get(0).unwrap();
        assert_eq!(unit.status, UnitStatus::InTransit);
        assert_eq!(unit.current_owner, s.hospital);
        assert_eq!(unit.requested_by, None);
        assert_eq!(s.ledger.history(0).unwrap().len(), 3);

        // in transit is terminal for the handshake
        let again = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 0, at(4));
        assert!(matches!(
            again,
            Err(CustodyError::InvalidState {
                status: UnitStatus::InTransit,
                ..
            })
        ));
    }

    /// Withdrawing requires a pending request
    #[test]
    fn withdraw_requires_pending_request() {
        let s = setup();

        let result = protocol::withdraw_request(&s.ledger, &s.hospital, 0, at(2));
        assert!(matches!(
            result,
            Err(CustodyError::InvalidState {
                status: UnitStatus::Available,
                ..
            })
        ));
    }

    /// A bank that does not hold the unit cannot turn its request down
    #[test]
    fn reject_requires_owning_bank() {
        let mut s = setup();
        let other_bank = Identity::generate();
        let admin = *s.registry.admin();
        s.registry.add_bank(&admin, other_bank).unwrap();
        let requested = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 0, at(2)).unwrap();
        s.ledger.apply(requested).unwrap();

        let result = protocol::reject_request(&s.registry, &s.ledger, &other_bank, 0, at(3));
        assert!(matches!(
            result,
            Err(CustodyError::Unauthorized {
                required: Role::OwningBank,
                caller,
            }) if caller == other_bank
        ));
        assert_eq!(s.ledger.get(0).unwrap().status, UnitStatus::Requested);
    }

    /// Approve, withdraw and reject all report unknown units
    #[test]
    fn unknown_unit_for_every_transition() {
        let s = setup();

        let approved = protocol::approve_transfer(&s.registry, &s.ledger, &s.bank, 4, &s.hospital, at(2));
        assert!(matches!(approved, Err(CustodyError::NotFound(4))));

        let withdrawn = protocol::withdraw_request(&s.ledger, &s.hospital, 5, at(2));
        assert!(matches!(withdrawn, Err(CustodyError::NotFound(5))));

        let rejected = protocol::reject_request(&s.registry, &s.ledger, &s.bank, 6, at(2));
        assert!(matches!(rejected, Err(CustodyError::NotFound(6))));
    }

    /// A unit already handed over has no request left to withdraw
    #[test]
    fn withdraw_after_approval_is_invalid() {
        let mut s = setup();
        let requested = protocol::request_unit(&s.registry, &s.ledger, &s.hospital, 0, at(2)).unwrap();
        s.ledger.apply(requested).unwrap();
        let approved =
            protocol::approve_transfer(&s.registry, &s.ledger, &s.bank, 0, &s.hospital, at(3)).unwrap();
        s.ledger.apply(approved).unwrap();

        let result = protocol::withdraw_request(&s.ledger, &s.hospital, 0, at(4));
        assert!(matches!(
            result,
            Err(CustodyError::InvalidState {
                unit_id: 0,
                status: UnitStatus::InTransit,
            })
        ));
    }
}

// CONFIG AND CLOCK TESTS
#[cfg(test)]
mod config_tests {
    use super::*;

    /// Defaults keep the store temporary with a 42 day shelf life
    #[test]
    fn defaults() {
        let config = EngineConfig::default();

        assert!(config.store_path.is_none());
        assert_eq!(config.shelf_life, TimeDelta::days(42));
        assert_eq!(config.max_donor_name, 128);
    }

    /// Builder methods override individual settings
    #[test]
    fn builder_overrides() {
        let config = EngineConfig::new()
            .with_store_path("/tmp/custody")
            .with_shelf_life(TimeDelta::days(35))
            .with_max_donor_name(16);

        assert_eq!(config.shelf_life, TimeDelta::days(35));
        assert_eq!(config.max_donor_name, 16);
        assert!(config.store_path.is_some());
    }

    /// Shelf life must be positive and small enough to store
    #[test]
    fn validate_rejects_unusable_shelf_life() {
        assert!(EngineConfig::default().validate().is_ok());

        for days in [0, -5, 365 * 300] {
            let config = EngineConfig::new().with_shelf_life(TimeDelta::days(days));
            assert!(
                matches!(config.validate(), Err(CustodyError::InvalidInput(_))),
                "{days} days accepted"
            );
        }
    }

    /// Adding past the last encodable instant gives nothing
    #[test]
    fn checked_add_stops_at_encodable_range() {
        let late = TimeStamp::new_with(2262, 1, 1, 0, 0, 0).unwrap();

        assert!(late.checked_add(TimeDelta::days(30)).is_some());
        assert!(late.checked_add(TimeDelta::days(365)).is_none());
    }

    /// A fixed clock always reports the same instant
    #[test]
    fn fixed_clock_is_fixed() {
        let clock = FixedClock(at(5));

        assert_eq!(clock.now(), at(5));
        assert_eq!(clock.now(), clock.now());
    }
}
