//! Escrow deal state machine driven by a single authorized garant.

use std::collections::HashMap;

use tracing::debug;

use crate::deal::{Deal, DealState};
use crate::error::{LedgerError, MarketError};
use crate::identity::Address;
use crate::market::TokenMarket;
use crate::Result;

/// Owner-driven escrow over a map of deal records.
///
/// A single `owner` identity, fixed at construction, is authorized to drive
/// every deal-mutating operation; every other caller gets an authorization
/// error. Custody moves through the designated token's transfer primitives,
/// with the escrow's own address as the holding account.
///
/// Each operation validates before it mutates, so a failure leaves both the
/// deal record and the token ledger exactly as they were.
#[derive(Debug, Clone)]
pub struct EscrowLedger {
    owner: Address,
    address: Address,
    deals: HashMap<u64, Deal>,
}

impl EscrowLedger {
    /// Creates an escrow ledger holding custody under `address`, driven by
    /// `owner`.
    pub fn new(address: Address, owner: Address) -> Self {
        debug!(%address, %owner, "escrow ledger created");
        Self {
            owner,
            address,
            deals: HashMap::new(),
        }
    }

    /// The identity authorized to drive every deal.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The escrow's own custody account on the token.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the recorded deal, or the zero-valued record if `deal_id`
    /// was never created.
    pub fn deal(&self, deal_id: u64) -> Deal {
        self.deals.get(&deal_id).cloned().unwrap_or_default()
    }

    /// Records a new deal with `garant = caller` in state `Created`.
    ///
    /// Reusing an id overwrites the prior record without warning; choosing
    /// unused ids is the caller's job.
    pub fn create_deal(
        &mut self,
        caller: Address,
        deal_id: u64,
        client: Address,
        implementer: Address,
        token: Address,
        amount: u128,
    ) -> Result<()> {
        self.authorize(caller)?;
        self.deals.insert(
            deal_id,
            Deal {
                garant: caller,
                client,
                implementer,
                token,
                transaction_amount: amount,
                state: DealState::Created,
            },
        );
        debug!(deal_id, %client, %implementer, %token, amount, "deal created");
        Ok(())
    }

    /// Moves the deal's full amount from the caller into escrow custody via
    /// the token's transfer-on-behalf-of primitive; the caller must have
    /// approved the escrow's address for at least that amount beforehand.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the deal is in `Created` (a second deposit is a
    /// caller error, rejected outright); allowance and balance failures
    /// propagate from the token.
    pub fn deposit_tokens(
        &mut self,
        caller: Address,
        deal_id: u64,
        token: &mut TokenMarket,
    ) -> Result<()> {
        self.authorize(caller)?;
        let escrow = self.address;
        let deal = Self::deal_mut(&mut self.deals, deal_id)?;
        check_token(deal, token)?;
        if deal.state != DealState::Created {
            return Err(LedgerError::InvalidState);
        }
        token.transfer_from(escrow, caller, escrow, deal.transaction_amount)?;
        deal.state = DealState::Deposited;
        debug!(deal_id, amount = deal.transaction_amount, "tokens deposited");
        Ok(())
    }

    /// Resolves the deal in the implementer's favor: the full custodied
    /// amount goes to the implementer.
    pub fn complete_deal(
        &mut self,
        caller: Address,
        deal_id: u64,
        token: &mut TokenMarket,
    ) -> Result<()> {
        self.authorize(caller)?;
        let escrow = self.address;
        let deal = Self::deal_mut(&mut self.deals, deal_id)?;
        check_token(deal, token)?;
        if deal.state != DealState::Deposited {
            return Err(LedgerError::InvalidState);
        }
        token.transfer(escrow, deal.implementer, deal.transaction_amount)?;
        deal.state = DealState::Completed;
        debug!(deal_id, implementer = %deal.implementer, "deal completed");
        Ok(())
    }

    /// Resolves the deal in the client's favor: the full custodied amount
    /// returns to the client.
    pub fn deny_deal(
        &mut self,
        caller: Address,
        deal_id: u64,
        token: &mut TokenMarket,
    ) -> Result<()> {
        self.authorize(caller)?;
        let escrow = self.address;
        let deal = Self::deal_mut(&mut self.deals, deal_id)?;
        check_token(deal, token)?;
        if deal.state != DealState::Deposited {
            return Err(LedgerError::InvalidState);
        }
        token.transfer(escrow, deal.client, deal.transaction_amount)?;
        deal.state = DealState::Denied;
        debug!(deal_id, client = %deal.client, "deal denied");
        Ok(())
    }

    /// Splits the custodied amount between implementer and client:
    /// `implementer_share = floor(amount * pct / 100)`, the client takes the
    /// remainder, so the shares always sum to the full amount.
    ///
    /// # Errors
    ///
    /// `InvalidPercentage` if `implementer_percentage > 100`; `InvalidState`
    /// unless the deal is in `Deposited`.
    pub fn finalize_deal(
        &mut self,
        caller: Address,
        deal_id: u64,
        token: &mut TokenMarket,
        implementer_percentage: u8,
    ) -> Result<()> {
        self.authorize(caller)?;
        if implementer_percentage > 100 {
            return Err(LedgerError::InvalidPercentage(implementer_percentage));
        }
        let escrow = self.address;
        let deal = Self::deal_mut(&mut self.deals, deal_id)?;
        check_token(deal, token)?;
        if deal.state != DealState::Deposited {
            return Err(LedgerError::InvalidState);
        }

        let amount = deal.transaction_amount;
        let implementer_share = amount
            .checked_mul(u128::from(implementer_percentage))
            .ok_or(MarketError::AmountOverflow)?
            / 100;
        let client_share = amount - implementer_share;

        // One custody check makes the pair of transfers all-or-nothing:
        // after the implementer's share leaves, at least client_share
        // remains, so neither transfer below can fail partway.
        let held = token.balance_of(escrow);
        if held < amount {
            return Err(MarketError::InsufficientBalance {
                needed: amount,
                available: held,
            }
            .into());
        }
        token.transfer(escrow, deal.implementer, implementer_share)?;
        token.transfer(escrow, deal.client, client_share)?;
        deal.state = DealState::Finalized;
        debug!(
            deal_id,
            implementer_share, client_share, "deal finalized"
        );
        Ok(())
    }

    fn authorize(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(LedgerError::Authorization(caller));
        }
        Ok(())
    }

    fn deal_mut(deals: &mut HashMap<u64, Deal>, deal_id: u64) -> Result<&mut Deal> {
        deals
            .get_mut(&deal_id)
            .ok_or(LedgerError::DealNotFound(deal_id))
    }
}

fn check_token(deal: &Deal, token: &TokenMarket) -> Result<()> {
    if token.address() != deal.token {
        return Err(LedgerError::TokenMismatch {
            expected: deal.token,
            passed: token.address(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::MarketParams;
    use crate::utils::assert_err;

    const PRICE: u128 = 100_000_000_000_000;
    const SUPPLY: u128 = 10_000_000_000_000_000_000_000;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn setup() -> (TokenMarket, EscrowLedger) {
        let market = TokenMarket::new(
            addr(0xA0),
            MarketParams {
                name: "Garant Token".into(),
                symbol: "GNT".into(),
                total_supply: SUPPLY,
                token_price: PRICE,
            },
        )
        .unwrap();
        let escrow = EscrowLedger::new(addr(0xE0), addr(1));
        (market, escrow)
    }

    #[test]
    fn only_owner_drives_deals() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();
        let intruder = addr(9);

        assert_err(
            escrow.create_deal(intruder, 1, addr(2), addr(3), market.address(), 4),
            LedgerError::Authorization(intruder),
        );

        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();

        assert_err(
            escrow.deposit_tokens(intruder, 1, &mut market),
            LedgerError::Authorization(intruder),
        );
        assert_err(
            escrow.complete_deal(intruder, 1, &mut market),
            LedgerError::Authorization(intruder),
        );
        assert_err(
            escrow.deny_deal(intruder, 1, &mut market),
            LedgerError::Authorization(intruder),
        );
        assert_err(
            escrow.finalize_deal(intruder, 1, &mut market, 50),
            LedgerError::Authorization(intruder),
        );
    }

    #[test]
    fn unknown_deal_is_rejected() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();

        assert_err(
            escrow.deposit_tokens(garant, 7, &mut market),
            LedgerError::DealNotFound(7),
        );
        // reads keep the zero-record behavior
        assert_eq!(escrow.deal(7), Deal::default());
    }

    #[test]
    fn deposit_requires_allowance() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();
        market.buy(garant, 4 * PRICE).unwrap();
        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();

        assert_err(
            escrow.deposit_tokens(garant, 1, &mut market),
            LedgerError::Market(MarketError::InsufficientAllowance {
                needed: 4,
                available: 0,
            }),
        );
        // nothing moved, deal untouched
        assert_eq!(market.balance_of(garant), 4);
        assert_eq!(escrow.deal(1).state, DealState::Created);
    }

    #[test]
    fn state_guards_reject_out_of_order_calls() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();
        market.buy(garant, 4 * PRICE).unwrap();
        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();

        // resolution before deposit
        assert_err(
            escrow.complete_deal(garant, 1, &mut market),
            LedgerError::InvalidState,
        );

        market.approve(garant, escrow.address(), 4);
        escrow.deposit_tokens(garant, 1, &mut market).unwrap();

        // second deposit
        assert_err(
            escrow.deposit_tokens(garant, 1, &mut market),
            LedgerError::InvalidState,
        );

        escrow.complete_deal(garant, 1, &mut market).unwrap();

        // second resolution of any kind
        assert_err(
            escrow.complete_deal(garant, 1, &mut market),
            LedgerError::InvalidState,
        );
        assert_err(
            escrow.deny_deal(garant, 1, &mut market),
            LedgerError::InvalidState,
        );
        assert_err(
            escrow.finalize_deal(garant, 1, &mut market, 50),
            LedgerError::InvalidState,
        );
    }

    #[test]
    fn finalize_validates_percentage() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();
        market.buy(garant, 4 * PRICE).unwrap();
        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();
        market.approve(garant, escrow.address(), 4);
        escrow.deposit_tokens(garant, 1, &mut market).unwrap();

        assert_err(
            escrow.finalize_deal(garant, 1, &mut market, 101),
            LedgerError::InvalidPercentage(101),
        );
        // still resolvable afterwards
        escrow.finalize_deal(garant, 1, &mut market, 100).unwrap();
        assert_eq!(market.balance_of(addr(3)), 4);
        assert_eq!(market.balance_of(addr(2)), 0);
    }

    #[test]
    fn rejects_mismatched_token() {
        let (mut market, mut escrow) = setup();
        let garant = escrow.owner();
        let mut other = TokenMarket::new(
            addr(0xB0),
            MarketParams {
                name: "Other".into(),
                symbol: "OTH".into(),
                total_supply: SUPPLY,
                token_price: PRICE,
            },
        )
        .unwrap();

        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();
        assert_err(
            escrow.deposit_tokens(garant, 1, &mut other),
            LedgerError::TokenMismatch {
                expected: market.address(),
                passed: other.address(),
            },
        );
    }

    #[test]
    fn create_overwrites_existing_id() {
        let (market, mut escrow) = setup();
        let garant = escrow.owner();

        escrow
            .create_deal(garant, 1, addr(2), addr(3), market.address(), 4)
            .unwrap();
        escrow
            .create_deal(garant, 1, addr(4), addr(5), market.address(), 9)
            .unwrap();

        let deal = escrow.deal(1);
        assert_eq!(deal.client, addr(4));
        assert_eq!(deal.implementer, addr(5));
        assert_eq!(deal.transaction_amount, 9);
        assert_eq!(deal.state, DealState::Created);
    }
}
