use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::allowance;
use crate::amount::{format_fixed, parse_units};
use crate::chain::ChainReader;
use crate::config::ChainConfig;
use crate::error::{Error, InvalidAmount};
use crate::quote::{expected_output, Direction};
use crate::signer::{Account, Signer, TransactionRequest};
use crate::token::Address;

/// Settle window for amount-driven allowance checks. Direction, token and
/// account changes bypass it and check immediately.
pub const ALLOWANCE_DEBOUNCE: Duration = Duration::from_millis(500);

const QUOTE_PLACES: usize = 6;
const BALANCE_PLACES: usize = 4;

/// Orchestrator state machine phases. `Disconnected` is initial; there is
/// no terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Idle,
    Checking,
    Ready,
    NeedsApproval,
    Submitting,
}

/// The user's current swap intent. Every mutation invalidates the derived
/// quote and allowance status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub direction: Direction,
    pub token: Address,
    pub amount: String,
}

/// What the submit control will do next. Rendered as a fixed label set so
/// an error never leaves the control ambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    EnterAmount,
    Approve(String),
    Sell,
    Buy,
    Processing,
}

impl fmt::Display for SubmitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnterAmount => f.write_str("Enter amount"),
            Self::Approve(symbol) => write!(f, "Approve {symbol}"),
            Self::Sell => f.write_str("Sell"),
            Self::Buy => f.write_str("Buy"),
            Self::Processing => f.write_str("Processing..."),
        }
    }
}

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct SwapView {
    pub account: Option<Account>,
    /// Token address -> decimal balance string (4 places). Tokens whose
    /// balance read failed are absent, not zero.
    pub balances: HashMap<Address, String>,
    pub direction: Direction,
    pub token: Address,
    pub amount: String,
    /// Expected counter-amount (6 places). `None` means the quote is
    /// unavailable; "0" means nothing to quote.
    pub quote: Option<String>,
    pub needs_approval: bool,
    pub phase: Phase,
    pub last_error: Option<String>,
    pub action: SubmitAction,
    pub submit_enabled: bool,
}

struct Inner {
    account: Option<Account>,
    balances: HashMap<Address, BigUint>,
    intent: SwapIntent,
    quote: Option<String>,
    needs_approval: bool,
    phase: Phase,
    last_error: Option<String>,
    /// Bumped on every intent mutation and post-swap reconciliation; an
    /// allowance result is applied only while its generation is current.
    generation: u64,
}

impl Inner {
    fn new(config: &ChainConfig) -> Self {
        Self {
            account: None,
            balances: HashMap::new(),
            intent: default_intent(config),
            quote: Some("0".to_string()),
            needs_approval: false,
            phase: Phase::Disconnected,
            last_error: None,
            generation: 0,
        }
    }
}

fn default_intent(config: &ChainConfig) -> SwapIntent {
    let token = config
        .sellable()
        .first()
        .map(|t| t.address.clone())
        .unwrap_or_else(|| config.stablecoin.clone());
    SwapIntent {
        direction: Direction::Buy,
        token,
        amount: String::new(),
    }
}

struct Shared {
    config: ChainConfig,
    reader: Arc<dyn ChainReader>,
    signer: Arc<dyn Signer>,
    inner: Mutex<Inner>,
    view_tx: watch::Sender<SwapView>,
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        let _ = self.view_tx.send(build_view(&self.config, inner));
    }

    /// The asset spent for the current intent: the selected token when
    /// selling, always the stablecoin when buying.
    fn spend_token(&self, intent: &SwapIntent) -> Address {
        match intent.direction {
            Direction::Sell => intent.token.clone(),
            Direction::Buy => self.config.stablecoin.clone(),
        }
    }

    /// Parsed positive spend amount, or `None` when empty/zero/garbage.
    fn spend_amount(&self, intent: &SwapIntent) -> Option<BigUint> {
        let decimals = self.config.decimals(&self.spend_token(intent));
        match parse_units(&intent.amount, decimals) {
            Ok(amount) if !amount.is_zero() => Some(amount),
            _ => None,
        }
    }
}

fn build_view(config: &ChainConfig, inner: &Inner) -> SwapView {
    let spend_token = match inner.intent.direction {
        Direction::Sell => inner.intent.token.clone(),
        Direction::Buy => config.stablecoin.clone(),
    };
    let amount_positive = parse_units(&inner.intent.amount, config.decimals(&spend_token))
        .map(|a| !a.is_zero())
        .unwrap_or(false);

    let action = if matches!(inner.phase, Phase::Checking | Phase::Submitting) {
        SubmitAction::Processing
    } else if inner.account.is_none() || !amount_positive {
        SubmitAction::EnterAmount
    } else if inner.needs_approval {
        SubmitAction::Approve(config.tokens.symbol(&spend_token))
    } else {
        match inner.intent.direction {
            Direction::Sell => SubmitAction::Sell,
            Direction::Buy => SubmitAction::Buy,
        }
    };

    let balances = config
        .tokens
        .entries()
        .iter()
        .filter_map(|entry| {
            inner.balances.get(&entry.address).map(|balance| {
                (
                    entry.address.clone(),
                    format_fixed(balance, entry.decimals as u32, BALANCE_PLACES),
                )
            })
        })
        .collect();

    SwapView {
        account: inner.account.clone(),
        balances,
        direction: inner.intent.direction,
        token: inner.intent.token.clone(),
        amount: inner.intent.amount.clone(),
        quote: inner.quote.clone(),
        needs_approval: inner.needs_approval,
        phase: inner.phase,
        last_error: inner.last_error.clone(),
        submit_enabled: amount_positive
            && matches!(inner.phase, Phase::Ready | Phase::NeedsApproval),
        action,
    }
}

/// The swap orchestrator: exclusively owns session state and ties quoting,
/// authorization checking and submission together.
///
/// Requires a tokio runtime; allowance checks run as spawned tasks so they
/// stay cancelable while the debounce window is open.
pub struct SwapWidget {
    shared: Arc<Shared>,
    view_rx: watch::Receiver<SwapView>,
    pending_check: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SwapWidget {
    pub fn new(
        config: ChainConfig,
        reader: Arc<dyn ChainReader>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        let inner = Inner::new(&config);
        let (view_tx, view_rx) = watch::channel(build_view(&config, &inner));
        let shared = Arc::new(Shared {
            config,
            reader,
            signer,
            inner: Mutex::new(inner),
            view_tx,
        });
        Self {
            shared,
            view_rx,
            pending_check: std::sync::Mutex::new(None),
        }
    }

    /// Most recent snapshot for rendering.
    pub fn view(&self) -> SwapView {
        self.view_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SwapView> {
        self.shared.view_tx.subscribe()
    }

    /// Establish the wallet session, refresh balances, and enter `Idle`.
    /// On failure the machine is forced to `Disconnected`.
    pub async fn connect(&self) -> Result<(), Error> {
        match self.shared.signer.connect().await {
            Ok(account) => {
                debug!("connected as {}", account.address);
                let mut inner = self.shared.inner.lock().await;
                inner.account = Some(account);
                inner.generation += 1;
                inner.phase = Phase::Idle;
                inner.last_error = None;
                self.refresh_balances(&mut inner).await;
                self.recompute_quote(&mut inner).await;
                // account change: allowance re-check bypasses the debounce
                self.schedule_allowance_check(&mut inner, Duration::ZERO);
                self.shared.publish(&inner);
                Ok(())
            }
            Err(e) => {
                warn!("connect failed: {e}");
                self.reset_disconnected(Some(e.to_string())).await;
                Err(Error::Connection(e))
            }
        }
    }

    /// Drop the session and clear all derived state.
    pub async fn disconnect(&self) {
        debug!("disconnecting");
        self.reset_disconnected(None).await;
    }

    /// Edit the entered amount. Quote recomputes immediately; the
    /// allowance re-check waits out the debounce window.
    pub async fn set_amount(&self, amount: &str) {
        let amount = amount.trim().to_string();
        self.apply_mutation(move |intent| intent.amount = amount, ALLOWANCE_DEBOUNCE)
            .await;
    }

    /// Select a different token. Re-checks allowance immediately.
    pub async fn set_token(&self, token: &Address) {
        let token = token.clone();
        self.apply_mutation(move |intent| intent.token = token, Duration::ZERO)
            .await;
    }

    /// Flip sell/buy. The spent asset changes identity, so the allowance
    /// re-check runs immediately against the new combination.
    pub async fn toggle_direction(&self) {
        self.apply_mutation(|intent| intent.direction = intent.direction.toggled(), Duration::ZERO)
            .await;
    }

    /// Submit whatever the machine is ready for: an approval in
    /// `NeedsApproval`, the swap itself in `Ready`. A no-op in every other
    /// phase or without a positive amount (the affordance is disabled).
    pub async fn submit(&self) -> Result<(), Error> {
        let mut inner = self.shared.inner.lock().await;
        let Some(account) = inner.account.clone() else {
            return Ok(());
        };
        let Some(amount) = self.shared.spend_amount(&inner.intent) else {
            return Ok(());
        };
        match inner.phase {
            Phase::NeedsApproval => self.submit_approval(&mut inner, &account, &amount).await,
            Phase::Ready => self.submit_swap(&mut inner, &account, &amount).await,
            _ => Ok(()),
        }
    }

    async fn submit_approval(
        &self,
        inner: &mut Inner,
        account: &Account,
        required: &BigUint,
    ) -> Result<(), Error> {
        let token = self.shared.spend_token(&inner.intent);
        inner.phase = Phase::Submitting;
        inner.last_error = None;
        self.shared.publish(inner);

        let request = allowance::build_approval(&token, &self.shared.config.marketplace);
        match self.shared.signer.send_transaction(&request).await {
            Ok(_) => {
                // The approval may itself have been rejected on-chain or
                // raised less than needed; trust only a fresh read.
                let (authorized, read_err) = allowance::is_authorized(
                    self.shared.reader.as_ref(),
                    &token,
                    &account.address,
                    &self.shared.config.marketplace,
                    required,
                )
                .await;
                inner.needs_approval = !authorized;
                inner.phase = if authorized {
                    Phase::Ready
                } else {
                    Phase::NeedsApproval
                };
                if let Some(e) = read_err {
                    inner.last_error = Some(e.to_string());
                }
                self.shared.publish(inner);
                Ok(())
            }
            Err(e) => {
                warn!("approval failed: {e}");
                inner.phase = Phase::NeedsApproval;
                inner.last_error = Some(e.to_string());
                self.shared.publish(inner);
                Err(Error::Transaction(e))
            }
        }
    }

    async fn submit_swap(
        &self,
        inner: &mut Inner,
        account: &Account,
        amount: &BigUint,
    ) -> Result<(), Error> {
        inner.phase = Phase::Submitting;
        inner.last_error = None;
        self.shared.publish(inner);

        let request = TransactionRequest::Swap {
            direction: inner.intent.direction,
            token: inner.intent.token.clone(),
            amount: amount.clone(),
        };
        match self.shared.signer.send_transaction(&request).await {
            Ok(_) => {
                debug!("swap submitted for {}", inner.intent.token);
                self.refresh_balances(inner).await;
                inner.intent.amount.clear();
                inner.quote = Some("0".to_string());
                inner.needs_approval = false;
                inner.phase = Phase::Idle;
                // supersede any check still in flight for the old intent
                inner.generation += 1;
                self.shared.publish(inner);
                Ok(())
            }
            Err(e) => {
                warn!("swap failed: {e}");
                // The allowance may have raced away underneath us;
                // re-evaluate fail-closed before settling the phase.
                let token = self.shared.spend_token(&inner.intent);
                let (authorized, _) = allowance::is_authorized(
                    self.shared.reader.as_ref(),
                    &token,
                    &account.address,
                    &self.shared.config.marketplace,
                    amount,
                )
                .await;
                inner.needs_approval = !authorized;
                inner.phase = if authorized {
                    Phase::Ready
                } else {
                    Phase::NeedsApproval
                };
                inner.last_error = Some(e.to_string());
                self.shared.publish(inner);
                Err(Error::Transaction(e))
            }
        }
    }

    async fn apply_mutation(&self, mutate: impl FnOnce(&mut SwapIntent), delay: Duration) {
        let mut inner = self.shared.inner.lock().await;
        if inner.account.is_none() {
            return;
        }
        mutate(&mut inner.intent);
        inner.generation += 1;
        inner.last_error = None;
        self.recompute_quote(&mut inner).await;
        self.schedule_allowance_check(&mut inner, delay);
        self.shared.publish(&inner);
    }

    /// Quote recompute: synchronous with the mutation, never debounced.
    async fn recompute_quote(&self, inner: &mut Inner) {
        let spend_token = self.shared.spend_token(&inner.intent);
        let decimals = self.shared.config.decimals(&spend_token);
        let amount = match parse_units(&inner.intent.amount, decimals) {
            Ok(amount) if !amount.is_zero() => amount,
            Ok(_) => {
                inner.quote = Some("0".to_string());
                return;
            }
            Err(InvalidAmount::Empty) => {
                inner.quote = Some("0".to_string());
                return;
            }
            Err(e) => {
                inner.quote = Some("0".to_string());
                inner.last_error = Some(e.to_string());
                return;
            }
        };

        // The marketplace prices the selected token in stablecoin units
        // regardless of direction.
        match self.shared.reader.get_spot_price(&inner.intent.token).await {
            Ok(price) => match expected_output(inner.intent.direction, &inner.intent.token, &amount, &price) {
                Ok(output) => {
                    let out_decimals = match inner.intent.direction {
                        Direction::Sell => self.shared.config.decimals(&self.shared.config.stablecoin),
                        Direction::Buy => self.shared.config.decimals(&inner.intent.token),
                    };
                    inner.quote = Some(format_fixed(&output, out_decimals, QUOTE_PLACES));
                }
                Err(e) => {
                    warn!("quote unavailable: {e}");
                    inner.quote = None;
                }
            },
            Err(e) => {
                warn!("spot price read failed: {e}");
                inner.quote = None;
                inner.last_error = Some(e.to_string());
            }
        }
    }

    /// Schedule the asynchronous allowance re-check, replacing (and
    /// aborting) any check still pending for a previous mutation.
    fn schedule_allowance_check(&self, inner: &mut Inner, delay: Duration) {
        let Some(account) = inner.account.clone() else {
            return;
        };
        let Some(required) = self.shared.spend_amount(&inner.intent) else {
            // Nothing to authorize; no read is performed.
            inner.needs_approval = false;
            inner.phase = Phase::Idle;
            self.cancel_pending();
            return;
        };

        inner.phase = Phase::Checking;
        let generation = inner.generation;
        let token = self.shared.spend_token(&inner.intent);
        let shared = self.shared.clone();

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let (authorized, read_err) = allowance::is_authorized(
                shared.reader.as_ref(),
                &token,
                &account.address,
                &shared.config.marketplace,
                &required,
            )
            .await;

            let mut inner = shared.inner.lock().await;
            if inner.generation != generation || inner.account.is_none() {
                debug!("discarding stale allowance result (generation {generation})");
                return;
            }
            inner.needs_approval = !authorized;
            inner.phase = if authorized {
                Phase::Ready
            } else {
                Phase::NeedsApproval
            };
            if let Some(e) = read_err {
                inner.last_error = Some(e.to_string());
            }
            shared.publish(&inner);
        });

        if let Some(old) = self.pending_check.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    fn cancel_pending(&self) {
        if let Some(handle) = self.pending_check.lock().unwrap().take() {
            handle.abort();
        }
    }

    async fn refresh_balances(&self, inner: &mut Inner) {
        let Some(account) = inner.account.clone() else {
            return;
        };
        for entry in self.shared.config.tokens.entries() {
            match self
                .shared
                .reader
                .get_balance(&entry.address, &account.address)
                .await
            {
                Ok(balance) => {
                    inner.balances.insert(entry.address.clone(), balance);
                }
                Err(e) => {
                    // Unknown, not zero: drop the entry entirely.
                    warn!("balance read failed for {}: {e}", entry.symbol);
                    inner.balances.remove(&entry.address);
                }
            }
        }
    }

    async fn reset_disconnected(&self, error: Option<String>) {
        self.cancel_pending();
        let mut inner = self.shared.inner.lock().await;
        inner.generation += 1;
        inner.account = None;
        inner.balances.clear();
        inner.intent = default_intent(&self.shared.config);
        inner.quote = Some("0".to_string());
        inner.needs_approval = false;
        inner.phase = Phase::Disconnected;
        inner.last_error = error;
        self.shared.publish(&inner);
    }
}

impl Drop for SwapWidget {
    fn drop(&mut self) {
        // Teardown: no background work may outlive the widget.
        self.cancel_pending();
    }
}
