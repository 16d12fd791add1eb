use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::error::{ConnectionError, TransactionError};
use crate::quote::Direction;
use crate::token::Address;

/// The connected wallet account. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
}

/// A transaction to submit through the external signer. Constructed
/// just-in-time and never stored beyond submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRequest {
    Approve {
        token: Address,
        spender: Address,
        amount: BigUint,
    },
    Swap {
        direction: Direction,
        token: Address,
        amount: BigUint,
    },
}

/// Opaque submission receipt. The core never looks past success/failure.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: Option<String>,
}

/// Wallet session and transaction submission service.
///
/// Treated as an opaque, possibly slow, possibly failing black box; the
/// orchestrator never assumes a submission completes promptly.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Establish a wallet session.
    async fn connect(&self) -> Result<Account, ConnectionError>;

    /// Sign and broadcast a transaction.
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransactionError>;
}

type SendHook = Box<dyn Fn(&TransactionRequest) + Send + Sync>;

/// Scripted in-memory signer for tests and presentation previews.
///
/// Records every submitted request. Sends can be scripted to fail, and an
/// optional hook runs on each successful send so tests can emulate the
/// on-chain effect of a transaction landing.
pub struct StaticSigner {
    account: Account,
    fail_connect: Mutex<Option<ConnectionError>>,
    fail_send: Mutex<Option<TransactionError>>,
    sent: Mutex<Vec<TransactionRequest>>,
    on_send: Mutex<Option<SendHook>>,
}

impl StaticSigner {
    pub fn new(account_address: &str) -> Self {
        Self {
            account: Account {
                address: Address::new(account_address),
            },
            fail_connect: Mutex::new(None),
            fail_send: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            on_send: Mutex::new(None),
        }
    }

    /// Script the next `connect` calls to fail.
    pub fn fail_connect(&self, error: Option<ConnectionError>) {
        *self.fail_connect.lock().unwrap() = error;
    }

    /// Script the next `send_transaction` calls to fail.
    pub fn fail_send(&self, error: Option<TransactionError>) {
        *self.fail_send.lock().unwrap() = error;
    }

    /// Run `hook` on every successful send, before it is acknowledged.
    pub fn on_send(&self, hook: impl Fn(&TransactionRequest) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    /// All requests submitted so far, in order.
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Signer for StaticSigner {
    async fn connect(&self) -> Result<Account, ConnectionError> {
        if let Some(error) = self.fail_connect.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.account.clone())
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransactionError> {
        if let Some(error) = self.fail_send.lock().unwrap().clone() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(request.clone());
        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook(request);
        }
        Ok(Receipt { tx_hash: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_signer_records_sends() {
        let signer = StaticSigner::new("0xabc");
        let account = signer.connect().await.unwrap();
        assert_eq!(account.address, Address::new("0xABC"));

        let request = TransactionRequest::Approve {
            token: Address::new("0x1"),
            spender: Address::new("0x2"),
            amount: BigUint::from(7u32),
        };
        signer.send_transaction(&request).await.unwrap();
        assert_eq!(signer.sent(), vec![request]);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let signer = StaticSigner::new("0xabc");
        signer.fail_connect(Some(ConnectionError::Unavailable("offline".to_string())));
        assert!(signer.connect().await.is_err());

        signer.fail_send(Some(TransactionError::Rejected("user".to_string())));
        let request = TransactionRequest::Swap {
            direction: Direction::Sell,
            token: Address::new("0x1"),
            amount: BigUint::from(1u32),
        };
        assert!(signer.send_transaction(&request).await.is_err());
        assert!(signer.sent().is_empty());
    }
}
