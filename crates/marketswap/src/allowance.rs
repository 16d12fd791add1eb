use log::warn;
use num_bigint::BigUint;

use crate::amount::max_uint256;
use crate::chain::ChainReader;
use crate::signer::TransactionRequest;
use crate::token::Address;

/// Whether `spender` is already authorized to move `required` units of
/// `token` on behalf of `owner`.
///
/// Fail-closed: if the allowance read fails, the answer is "not
/// authorized" — a swap must never proceed on an unknown allowance. The
/// read error is returned alongside for surfacing.
pub async fn is_authorized(
    reader: &dyn ChainReader,
    token: &Address,
    owner: &Address,
    spender: &Address,
    required: &BigUint,
) -> (bool, Option<crate::error::ReadError>) {
    match reader.get_allowance(token, owner, spender).await {
        Ok(allowance) => (&allowance >= required, None),
        Err(e) => {
            warn!("allowance read failed for token {token}, treating as unauthorized: {e}");
            (false, Some(e))
        }
    }
}

/// Build the authorization-raising transaction for `token`.
///
/// Always requests the maximum representable amount rather than the exact
/// swap size, so subsequent trades of the same token skip the approval
/// step.
pub fn build_approval(token: &Address, spender: &Address) -> TransactionRequest {
    TransactionRequest::Approve {
        token: token.clone(),
        spender: spender.clone(),
        amount: max_uint256(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StaticChainReader;

    fn addrs() -> (Address, Address, Address) {
        (Address::new("0xt"), Address::new("0xo"), Address::new("0xs"))
    }

    #[tokio::test]
    async fn test_authorized_when_allowance_covers_amount() {
        let (token, owner, spender) = addrs();
        let reader = StaticChainReader::new();
        reader.set_allowance(&token, &owner, &spender, BigUint::from(100u32));

        let (ok, err) = is_authorized(&reader, &token, &owner, &spender, &BigUint::from(100u32)).await;
        assert!(ok);
        assert!(err.is_none());

        let (ok, _) = is_authorized(&reader, &token, &owner, &spender, &BigUint::from(101u32)).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_idempotent_for_unchanged_state() {
        let (token, owner, spender) = addrs();
        let reader = StaticChainReader::new();
        reader.set_allowance(&token, &owner, &spender, BigUint::from(50u32));

        let required = BigUint::from(10u32);
        let (first, _) = is_authorized(&reader, &token, &owner, &spender, &required).await;
        let (second, _) = is_authorized(&reader, &token, &owner, &spender, &required).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fail_closed_on_read_error() {
        let (token, owner, spender) = addrs();
        let reader = StaticChainReader::new();
        reader.set_allowance(&token, &owner, &spender, max_uint256());
        reader.fail_allowances(true);

        // Allowance on chain would cover it, but the read failed.
        let (ok, err) = is_authorized(&reader, &token, &owner, &spender, &BigUint::from(1u32)).await;
        assert!(!ok);
        assert!(err.is_some());
    }

    #[test]
    fn test_approval_requests_max_uint256() {
        let (token, _, spender) = addrs();
        match build_approval(&token, &spender) {
            TransactionRequest::Approve {
                token: t,
                spender: s,
                amount,
            } => {
                assert_eq!(t, token);
                assert_eq!(s, spender);
                assert_eq!(amount, max_uint256());
            }
            other => panic!("expected Approve, got {other:?}"),
        }
    }
}
