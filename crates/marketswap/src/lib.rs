//! Swap orchestration core for a token marketplace widget.
//!
//! A connected wallet account exchanges registered tokens against a
//! reference stablecoin through a single marketplace contract. This crate
//! owns the orchestration state machine: quoting, allowance checking
//! (debounced, cancelable, fail-closed), approval and swap submission, and
//! post-submit reconciliation. Wallet sessions, transaction signing and
//! RPC transport stay behind the [`Signer`] and [`ChainReader`] seams.

pub mod allowance;
pub mod amount;
pub mod chain;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod quote;
pub mod signer;
pub mod token;

// Re-exports for convenience
pub use chain::{ChainReader, StaticChainReader};
pub use config::ChainConfig;
pub use error::Error;
pub use orchestrator::{Phase, SubmitAction, SwapIntent, SwapView, SwapWidget};
pub use quote::Direction;
pub use signer::{Account, Signer, StaticSigner, TransactionRequest};
pub use token::{Address, TokenEntry, TokenRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{max_uint256, parse_units};
    use num_bigint::BigUint;
    use std::sync::Arc;
    use std::time::Duration;

    const ACCOUNT: &str = "0xfeedfeedfeedfeedfeedfeedfeedfeedfeedfeed";

    fn wei(s: &str) -> BigUint {
        parse_units(s, 18).unwrap()
    }

    /// Full session walk: connect, quote, approve, swap, reconcile.
    #[tokio::test(start_paused = true)]
    async fn test_full_swap_session() {
        let config = ChainConfig::kinto();
        let account = Address::new(ACCOUNT);
        let usdc = config.stablecoin.clone();
        let src = Address::new("0x28B9786677F2261487494581a73EE724eD2db1f2");
        let marketplace = config.marketplace.clone();

        let reader = Arc::new(StaticChainReader::new());
        reader.set_price(&src, wei("2"));
        reader.set_balance(&src, &account, wei("100"));
        reader.set_balance(&usdc, &account, wei("10"));

        let signer = Arc::new(StaticSigner::new(ACCOUNT));
        {
            // Script the on-chain effects of transactions landing.
            let reader = reader.clone();
            let (account, usdc, src) = (account.clone(), usdc.clone(), src.clone());
            signer.on_send(move |request| match request {
                TransactionRequest::Approve { token, spender, amount } => {
                    reader.set_allowance(token, &account, spender, amount.clone());
                }
                TransactionRequest::Swap { .. } => {
                    // sold 100 SRC at price 2
                    reader.set_balance(&src, &account, wei("0"));
                    reader.set_balance(&usdc, &account, wei("210"));
                }
            });
        }

        let widget = SwapWidget::new(config, reader.clone(), signer.clone());
        widget.connect().await.unwrap();
        assert_eq!(widget.view().phase, Phase::Idle);
        assert_eq!(
            widget.view().balances.get(&src).map(String::as_str),
            Some("100.0000")
        );

        // Sell 100 SRC. No allowance yet, so approval comes first.
        widget.toggle_direction().await;
        widget.set_amount("100").await;
        assert_eq!(widget.view().quote.as_deref(), Some("200.000000"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(widget.view().phase, Phase::NeedsApproval);
        assert_eq!(widget.view().action, SubmitAction::Approve("SRC".to_string()));

        widget.submit().await.unwrap();
        assert_eq!(widget.view().phase, Phase::Ready);
        assert_eq!(widget.view().action, SubmitAction::Sell);

        widget.submit().await.unwrap();
        let sent = signer.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], TransactionRequest::Approve { .. }));
        match &sent[1] {
            TransactionRequest::Swap { direction, token, amount } => {
                assert_eq!(*direction, Direction::Sell);
                assert_eq!(token, &src);
                assert_eq!(amount, &wei("100"));
            }
            other => panic!("expected Swap, got {other:?}"),
        }

        let view = widget.view();
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.amount, "");
        assert_eq!(view.quote.as_deref(), Some("0"));
        assert_eq!(view.balances.get(&usdc).map(String::as_str), Some("210.0000"));
        assert_eq!(view.balances.get(&src).map(String::as_str), Some("0.0000"));

        // The max approval sticks: the next sale of SRC skips approval.
        widget.set_amount("1").await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(widget.view().phase, Phase::Ready);
        assert_eq!(
            reader
                .get_allowance(&src, &account, &marketplace)
                .await
                .unwrap(),
            max_uint256()
        );
    }
}
