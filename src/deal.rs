//! Deal records and their lifecycle states.

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// Lifecycle of a deal.
///
/// `Completed`, `Denied` and `Finalized` are terminal: once a deal resolves
/// it stays queryable as a historical record but accepts no further
/// transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealState {
    /// Recorded, awaiting the garant's deposit.
    #[default]
    Created,
    /// Custody transferred to the escrow; awaiting resolution.
    Deposited,
    /// Resolved: full amount paid to the implementer.
    Completed,
    /// Resolved: full amount returned to the client.
    Denied,
    /// Resolved: amount split between implementer and client.
    Finalized,
}

impl DealState {
    /// Whether the deal has reached a terminal resolution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Denied | Self::Finalized)
    }
}

/// A custody-and-settlement record binding a garant, client, implementer,
/// token, and amount.
///
/// The default value is the zero-valued record reads return for ids no deal
/// was ever created under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// Party who created and drives the deal.
    pub garant: Address,
    /// Receives the funds on denial, and the remainder on finalization.
    pub client: Address,
    /// Receives the funds on completion, and their share on finalization.
    pub implementer: Address,
    /// Token contract whose units this deal custodies.
    pub token: Address,
    /// Quantity of token units in scope for this deal.
    pub transaction_amount: u128,
    /// Current lifecycle state.
    pub state: DealState,
}

impl Deal {
    /// True once a terminal resolution has executed.
    pub fn deal_completed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Records that a deposit was made for this deal, not that funds are
    /// currently held: completion and finalization leave it set as a
    /// historical fact, denial clears it.
    pub fn funds_deposited(&self) -> bool {
        matches!(
            self.state,
            DealState::Deposited | DealState::Completed | DealState::Finalized
        )
    }
}
