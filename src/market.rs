//! Fixed-price token market: a balance/allowance ledger with a deterministic
//! two-way conversion between the native currency and token units.

use std::collections::HashMap;

use tracing::debug;

use crate::error::MarketError;
use crate::identity::Address;
use crate::interface::MarketParams;
use crate::Result;

/// Decimals for every market.
pub const DECIMALS: u8 = 18;

/// Fixed-price fungible-token market.
///
/// The full supply is minted to the market's own account at construction;
/// tokens enter circulation through [`TokenMarket::buy`] and return through
/// [`TokenMarket::sell`]. The system is closed: the sum of all balances
/// equals `total_supply` at all times.
///
/// Every operation takes the authenticated `caller` identity supplied by the
/// ledger runtime, and either completes fully or returns an error having
/// mutated nothing.
#[derive(Debug, Clone)]
pub struct TokenMarket {
    name: String,
    symbol: String,
    total_supply: u128,
    token_price: u128,
    address: Address,
    /// Native currency retained from buys, paid back out on sells.
    reserve: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl TokenMarket {
    /// Creates a market at `address` and mints the whole supply to it.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::ZeroTokenPrice` if `params.token_price` is zero;
    /// the price is immutable after construction, so a zero price would make
    /// every buy divide by zero forever.
    pub fn new(address: Address, params: MarketParams) -> Result<Self> {
        if params.token_price == 0 {
            return Err(MarketError::ZeroTokenPrice.into());
        }
        let mut balances = HashMap::new();
        balances.insert(address, params.total_supply);
        debug!(
            %address,
            total_supply = params.total_supply,
            token_price = params.token_price,
            "token market created"
        );
        Ok(Self {
            name: params.name,
            symbol: params.symbol,
            total_supply: params.total_supply,
            token_price: params.token_price,
            address,
            reserve: 0,
            balances,
            allowances: HashMap::new(),
        })
    }

    /// Buys tokens at the fixed price; `payment` is the native-currency
    /// amount the runtime collected from `caller`.
    ///
    /// Yields `floor(payment / token_price)` tokens. The full payment is
    /// retained by the market: any remainder below one token's price is
    /// forfeited, so callers wanting an exact trade pay exact multiples
    /// of the price.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` if the payment buys zero tokens;
    /// `InsufficientBalance` if the market itself cannot cover the sale.
    pub fn buy(&mut self, caller: Address, payment: u128) -> Result<u128> {
        let tokens_out = payment / self.token_price;
        if tokens_out == 0 {
            return Err(MarketError::InsufficientFunds {
                required: self.token_price,
                available: payment,
            }
            .into());
        }
        let reserve = self
            .reserve
            .checked_add(payment)
            .ok_or(MarketError::AmountOverflow)?;
        let market = self.address;
        self.debit(market, tokens_out)?;
        self.credit(caller, tokens_out);
        self.reserve = reserve;
        debug!(%caller, payment, tokens_out, "tokens bought");
        Ok(tokens_out)
    }

    /// Sells `amount` tokens back to the market at the fixed price and
    /// returns the currency payout (`amount * token_price`, exact) for the
    /// runtime to credit to `caller`.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if the caller holds fewer than `amount` tokens;
    /// `AmountOverflow` if the payout exceeds u128; `InsufficientFunds` if
    /// the market's reserve cannot cover the payout.
    pub fn sell(&mut self, caller: Address, amount: u128) -> Result<u128> {
        let balance = self.balance_of(caller);
        if balance < amount {
            return Err(MarketError::InsufficientBalance {
                needed: amount,
                available: balance,
            }
            .into());
        }
        let payout = amount
            .checked_mul(self.token_price)
            .ok_or(MarketError::AmountOverflow)?;
        if self.reserve < payout {
            return Err(MarketError::InsufficientFunds {
                required: payout,
                available: self.reserve,
            }
            .into());
        }
        let market = self.address;
        self.debit(caller, amount)?;
        self.credit(market, amount);
        self.reserve -= payout;
        debug!(%caller, amount, payout, "tokens sold");
        Ok(payout)
    }

    /// Moves `amount` tokens from `caller` to `to`.
    pub fn transfer(&mut self, caller: Address, to: Address, amount: u128) -> Result<()> {
        self.debit(caller, amount)?;
        self.credit(to, amount);
        debug!(from = %caller, %to, amount, "transfer");
        Ok(())
    }

    /// Sets `spender`'s allowance against `caller` to exactly `amount`.
    pub fn approve(&mut self, caller: Address, spender: Address, amount: u128) {
        self.allowances.insert((caller, spender), amount);
        debug!(owner = %caller, %spender, amount, "allowance set");
    }

    /// Moves `amount` tokens from `from` to `to` on the strength of the
    /// allowance `from` granted to `caller`, consuming that much of it.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        let allowed = self.allowance(from, caller);
        if allowed < amount {
            return Err(MarketError::InsufficientAllowance {
                needed: amount,
                available: allowed,
            }
            .into());
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        self.allowances.insert((from, caller), allowed - amount);
        debug!(spender = %caller, %from, %to, amount, "transfer on behalf");
        Ok(())
    }

    /// Token balance of `account`; zero for accounts never seen.
    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    /// Remaining allowance `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn token_price(&self) -> u128 {
        self.token_price
    }

    /// Native currency currently held by the market.
    pub fn reserve(&self) -> u128 {
        self.reserve
    }

    /// The market's own account identity.
    pub fn address(&self) -> Address {
        self.address
    }

    fn debit(&mut self, account: Address, amount: u128) -> Result<()> {
        let balance = self.balances.entry(account).or_default();
        if *balance < amount {
            return Err(MarketError::InsufficientBalance {
                needed: amount,
                available: *balance,
            }
            .into());
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: u128) {
        *self.balances.entry(account).or_default() += amount;
    }
}
