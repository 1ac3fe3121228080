use thiserror::Error;

use crate::identity::Address;

/// Ledger- and escrow-related errors.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// Caller is not the escrow owner.
    #[error("caller {0} is not authorized")]
    Authorization(Address),

    /// Mutating operation on an id no deal was ever created under.
    #[error("no deal with id {0}")]
    DealNotFound(u64),

    /// Attempted an invalid deal state transition.
    #[error("invalid deal state transition")]
    InvalidState,

    /// Custody operation against a token other than the deal's.
    #[error("token {passed} does not match deal token {expected}")]
    TokenMismatch { expected: Address, passed: Address },

    /// Finalization percentage outside `[0, 100]`.
    #[error("implementer percentage must be within [0, 100], got {0}")]
    InvalidPercentage(u8),

    #[error("market error: {0}")]
    Market(MarketError),

    #[error("identity error: {0}")]
    Identity(IdentityError),
}

/// Errors raised by the token market's ledger primitives.
#[derive(Debug, Error, PartialEq)]
pub enum MarketError {
    #[error("insufficient balance (needed {needed}, available {available})")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance (needed {needed}, available {available})")]
    InsufficientAllowance { needed: u128, available: u128 },

    /// Buy payment below one token's price, or sell payout exceeding
    /// the market's currency reserve.
    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u128, available: u128 },

    #[error("amount arithmetic overflow")]
    AmountOverflow,

    #[error("token price must be non-zero")]
    ZeroTokenPrice,
}

/// Errors that might occur while parsing an [`Address`].
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("cannot parse identity from empty string")]
    EmptyIdentity,

    #[error("expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl From<MarketError> for LedgerError {
    fn from(value: MarketError) -> Self {
        Self::Market(value)
    }
}

impl From<IdentityError> for LedgerError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}
