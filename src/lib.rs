/// Deal records and their lifecycle states
pub mod deal;
/// Escrow deal state machine driven by the garant
pub mod escrow;
/// Account identities as authenticated by the ledger runtime
pub mod identity;
/// JSON (de)serialization of deployment parameters
pub mod interface;
/// Fixed-price token market and ledger-transfer primitives
pub mod market;

pub mod error;
pub mod utils;

pub use crate::deal::{Deal, DealState};
pub use crate::error::{IdentityError, LedgerError, MarketError};
pub use crate::escrow::EscrowLedger;
pub use crate::identity::Address;
pub use crate::interface::{EscrowParams, MarketParams};
pub use crate::market::{TokenMarket, DECIMALS};

pub type Result<T> = std::result::Result<T, LedgerError>;
