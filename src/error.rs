use crate::identity::Identity;
use crate::unit::UnitStatus;
use std::fmt;

/// Who an operation needed the caller to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Bank,
    Hospital,
    /// the bank currently holding the unit
    OwningBank,
    /// the hospital recorded as requesting the unit
    Requester,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Bank => "bank",
            Role::Hospital => "hospital",
            Role::OwningBank => "owning bank",
            Role::Requester => "requester",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CustodyError {
    #[error("{caller} is not authorized, this action requires the {required} role")]
    Unauthorized { caller: Identity, required: Role },
    #[error("unit {unit_id} is {status}, which does not allow this action")]
    InvalidState { unit_id: u64, status: UnitStatus },
    #[error("hospital {hospital} did not request unit {unit_id}")]
    MismatchedRequester {
        unit_id: u64,
        hospital: Identity,
        requested_by: Option<Identity>,
    },
    #[error("no blood unit with id {0}")]
    NotFound(u64),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("the custody registry has already been initialized")]
    AlreadyInitialized,
    #[error("the store holds no custody registry")]
    NotInitialized,
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

impl CustodyError {
    /// True for the rejections callers cause, false for storage and codec faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CustodyError::Unauthorized { .. }
                | CustodyError::InvalidState { .. }
                | CustodyError::MismatchedRequester { .. }
                | CustodyError::NotFound(_)
                | CustodyError::InvalidInput(_)
                | CustodyError::AlreadyInitialized
        )
    }
}

pub type CustodyResult<T> = Result<T, CustodyError>;
