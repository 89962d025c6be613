//! # Ledger Configuration & Constants
//!
//! Every magic number in the execution model lives here. Domain tags are
//! part of address and slot derivation, so changing one silently moves every
//! account and every storage entry. Don't.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Address length in bytes. Same as Ethereum, for the same reasons.
pub const ADDRESS_LENGTH: usize = 20;

/// Domain tag for label-derived externally owned addresses.
pub const LABEL_ADDRESS_DOMAIN: &[u8] = b"simplesafe.address.label";

/// Domain tag for contract creation addresses.
pub const CREATE_ADDRESS_DOMAIN: &[u8] = b"simplesafe.address.create";

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Slot key length in bytes. One BLAKE3 digest.
pub const SLOT_LENGTH: usize = 32;

/// Domain tag for named logic slots.
pub const SLOT_DOMAIN: &[u8] = b"simplesafe.slot";

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Maximum nesting of calls within one transaction. Matches the EVM limit;
/// anything deeper is a runaway reentrancy loop, not a workload.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Runtime-tunable ledger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum call nesting before a transaction is aborted.
    pub max_call_depth: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_tags_are_distinct() {
        assert_ne!(LABEL_ADDRESS_DOMAIN, CREATE_ADDRESS_DOMAIN);
        assert_ne!(LABEL_ADDRESS_DOMAIN, SLOT_DOMAIN);
        assert_ne!(CREATE_ADDRESS_DOMAIN, SLOT_DOMAIN);
    }

    #[test]
    fn test_default_config_uses_constant_depth() {
        assert_eq!(LedgerConfig::default().max_call_depth, MAX_CALL_DEPTH);
    }

    #[test]
    fn test_lengths_fit_a_digest() {
        assert!(ADDRESS_LENGTH <= SLOT_LENGTH);
    }
}
