use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::ReadError;
use crate::token::Address;

/// Read-only queries against the remote ledger at a pinned chain identity.
///
/// All reads are idempotent and side-effect-free. A failed read means the
/// value is unknown; callers must never substitute zero.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Balance of `token` held by `account`.
    async fn get_balance(&self, token: &Address, account: &Address)
        -> Result<BigUint, ReadError>;

    /// Amount of `token` that `spender` may move on behalf of `owner`.
    async fn get_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<BigUint, ReadError>;

    /// Marketplace spot price of 1 unit of `token`, in stablecoin base
    /// units scaled by 10^18.
    async fn get_spot_price(&self, token: &Address) -> Result<BigUint, ReadError>;
}

/// In-memory chain reader for tests and presentation previews.
///
/// Balances and allowances default to zero; a token with no configured
/// price behaves like an unregistered token and fails with
/// [`ReadError::NoQuote`]. Reads can be scripted to fail or to stall for a
/// fixed delay, and every allowance read is logged.
#[derive(Default)]
pub struct StaticChainReader {
    balances: Mutex<HashMap<(Address, Address), BigUint>>,
    allowances: Mutex<HashMap<(Address, Address, Address), BigUint>>,
    prices: Mutex<HashMap<Address, BigUint>>,
    fail_allowances: AtomicBool,
    fail_balances: AtomicBool,
    allowance_delay: Mutex<Option<Duration>>,
    allowance_reads: Mutex<Vec<Address>>,
}

impl StaticChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, token: &Address, account: &Address, amount: BigUint) {
        self.balances
            .lock()
            .unwrap()
            .insert((token.clone(), account.clone()), amount);
    }

    pub fn set_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: BigUint,
    ) {
        self.allowances
            .lock()
            .unwrap()
            .insert((token.clone(), owner.clone(), spender.clone()), amount);
    }

    pub fn set_price(&self, token: &Address, price: BigUint) {
        self.prices.lock().unwrap().insert(token.clone(), price);
    }

    /// Make every allowance read fail with an RPC error.
    pub fn fail_allowances(&self, fail: bool) {
        self.fail_allowances.store(fail, Ordering::SeqCst);
    }

    /// Make every balance read fail with an RPC error.
    pub fn fail_balances(&self, fail: bool) {
        self.fail_balances.store(fail, Ordering::SeqCst);
    }

    /// Stall allowance reads for `delay` before resolving.
    pub fn set_allowance_delay(&self, delay: Option<Duration>) {
        *self.allowance_delay.lock().unwrap() = delay;
    }

    /// Tokens queried by allowance reads, in order.
    pub fn allowance_reads(&self) -> Vec<Address> {
        self.allowance_reads.lock().unwrap().clone()
    }

    pub fn allowance_read_count(&self) -> usize {
        self.allowance_reads.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainReader for StaticChainReader {
    async fn get_balance(
        &self,
        token: &Address,
        account: &Address,
    ) -> Result<BigUint, ReadError> {
        if self.fail_balances.load(Ordering::SeqCst) {
            return Err(ReadError::Rpc("static reader: balance failure".to_string()));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token.clone(), account.clone()))
            .cloned()
            .unwrap_or_else(BigUint::zero))
    }

    async fn get_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<BigUint, ReadError> {
        self.allowance_reads.lock().unwrap().push(token.clone());

        let delay = *self.allowance_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_allowances.load(Ordering::SeqCst) {
            return Err(ReadError::Rpc(
                "static reader: allowance failure".to_string(),
            ));
        }
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .cloned()
            .unwrap_or_else(BigUint::zero))
    }

    async fn get_spot_price(&self, token: &Address) -> Result<BigUint, ReadError> {
        self.prices
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| ReadError::NoQuote {
                token: token.to_string(),
            })
    }
}
