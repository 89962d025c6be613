//! Error types for contract execution.
//!
//! Every call that can fail returns an [`ExecError`]. Any error aborts the
//! whole enclosing transaction; the ledger restores the pre-transaction
//! world before handing the error back. [`ExecError::kind`] folds the
//! variants into the small taxonomy callers actually branch on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;

/// Coarse classification of an [`ExecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller lacks the privilege the operation requires.
    Authorization,
    /// A recorded or external balance (or allowance) is too small.
    InsufficientBalance,
    /// A one-time initialization was attempted a second time.
    Reinitialization,
    /// An indexed lookup ran past the end of a list.
    Bounds,
    /// An external collaborator failed for a reason of its own.
    Collaborator,
    /// The call itself was malformed or the ledger refused to run it.
    Execution,
}

/// Errors that can occur while executing a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// The caller is not the identity the operation is restricted to.
    #[error("unauthorized: {caller} is not the {role}")]
    Unauthorized {
        /// Who attempted the call.
        caller: Address,
        /// The role the operation requires ("owner", "admin").
        role: &'static str,
    },

    /// Delegated code tried to reach the admin region of the account it
    /// runs against.
    #[error("admin region of {account} is not reachable from code at {code}")]
    AdminRegionDenied {
        /// Account whose admin region was addressed.
        account: Address,
        /// Code that was running.
        code: Address,
    },

    /// A debit exceeds the recorded balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Balance on record.
        available: u128,
        /// Amount the caller tried to move.
        requested: u128,
    },

    /// A delegated spend exceeds the approved allowance.
    #[error("insufficient allowance: approved {allowance}, requested {requested}")]
    InsufficientAllowance {
        /// Allowance on record.
        allowance: u128,
        /// Amount the spender tried to move.
        requested: u128,
    },

    /// The instance has already been initialized.
    #[error("already initialized: owner can only be set once")]
    AlreadyInitialized,

    /// Index past the end of a list.
    #[error("index out of bounds: index {index}, length {len}")]
    OutOfBounds {
        /// Requested index.
        index: u128,
        /// Current list length.
        len: u128,
    },

    /// An external collaborator reported failure or reverted.
    #[error("collaborator {collaborator} failed: {reason}")]
    CollaboratorFailure {
        /// The collaborating contract.
        collaborator: Address,
        /// What went wrong, as reported.
        reason: String,
    },

    /// The target account has no code to execute.
    #[error("no code at {0}")]
    NoCode(Address),

    /// Contract creation derived an address that is already in use.
    #[error("address collision: account {0} already has code")]
    AddressCollision(Address),

    /// The contract does not recognize the selector.
    #[error("unknown selector '{selector}' on {contract}")]
    UnknownSelector {
        /// Contract name.
        contract: &'static str,
        /// The selector that was sent.
        selector: String,
    },

    /// A call argument is missing or has the wrong type.
    #[error("invalid argument {index} for '{selector}': {reason}")]
    InvalidArgument {
        /// Selector being decoded.
        selector: String,
        /// Zero-based argument position.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// A storage slot holds a word of an unexpected type.
    #[error("storage corrupted: expected {expected}, found {found}")]
    StorageCorrupted {
        /// Expected word type.
        expected: &'static str,
        /// Word type actually found.
        found: &'static str,
    },

    /// A call returned something other than what its caller decodes.
    #[error("unexpected return from '{selector}': expected {expected}")]
    UnexpectedReturn {
        /// Selector that was invoked.
        selector: String,
        /// Word type the caller expected.
        expected: &'static str,
    },

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,

    /// Call nesting exceeded the configured limit.
    #[error("call depth exceeded: limit {limit}")]
    CallDepthExceeded {
        /// Configured maximum depth.
        limit: usize,
    },
}

impl ExecError {
    /// Classifies this error into the operation-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Unauthorized { .. } | ExecError::AdminRegionDenied { .. } => {
                ErrorKind::Authorization
            }
            ExecError::InsufficientBalance { .. } | ExecError::InsufficientAllowance { .. } => {
                ErrorKind::InsufficientBalance
            }
            ExecError::AlreadyInitialized => ErrorKind::Reinitialization,
            ExecError::OutOfBounds { .. } => ErrorKind::Bounds,
            ExecError::CollaboratorFailure { .. } => ErrorKind::Collaborator,
            ExecError::NoCode(_)
            | ExecError::AddressCollision(_)
            | ExecError::UnknownSelector { .. }
            | ExecError::InvalidArgument { .. }
            | ExecError::StorageCorrupted { .. }
            | ExecError::UnexpectedReturn { .. }
            | ExecError::Overflow
            | ExecError::CallDepthExceeded { .. } => ErrorKind::Execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_and_allowance_share_a_kind() {
        let a = ExecError::InsufficientBalance {
            available: 0,
            requested: 50,
        };
        let b = ExecError::InsufficientAllowance {
            allowance: 100,
            requested: 800,
        };
        assert_eq!(a.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(b.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn messages_carry_fields() {
        let err = ExecError::OutOfBounds { index: 3, len: 1 };
        assert_eq!(err.to_string(), "index out of bounds: index 3, length 1");
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn unauthorized_names_the_role() {
        let caller = Address::from_label("mallory");
        let err = ExecError::Unauthorized {
            caller,
            role: "owner",
        };
        assert!(err.to_string().contains("owner"));
        assert!(err.to_string().contains(&caller.to_hex()));
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
}
