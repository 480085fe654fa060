//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify:
//! - Conservation: settled balances plus open escrow never change
//! - Idempotent replay: reading a balance twice yields the same value
//! - Compaction preserves balances, also across open and settled purchases
//! - Fast-transfer ceiling and safe-transfer guard

use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;
use token_ledger::{
    AccountId, Config, ContractAddress, Error, InMemoryMarketplace, TokenLedger, TxId,
};

const ACCOUNTS: u32 = 4;
const LIMIT: i64 = 10;

/// A transfer between two of the seeded accounts
#[derive(Debug, Clone)]
struct Transfer {
    from: u32,
    to: u32,
    amount: i64,
    safe: bool,
    purchase: bool,
}

/// One step of a generated ledger workload
#[derive(Debug, Clone)]
enum Step {
    Send(Transfer),
    /// Try to settle the n-th open purchase, consumed or not
    Settle { pick: usize, consumed: bool },
    Prune(u32),
}

/// Strategy for transfers among accounts 1..=ACCOUNTS
fn transfer_strategy() -> impl Strategy<Value = Transfer> {
    (1..=ACCOUNTS, 1..=ACCOUNTS, 1i64..=LIMIT, any::<bool>(), any::<bool>()).prop_map(
        |(from, to, amount, safe, purchase)| Transfer {
            from,
            to,
            amount,
            safe,
            purchase,
        },
    )
}

/// Strategy mixing transfers, purchase settlements and compaction
fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => transfer_strategy().prop_map(Step::Send),
        2 => (any::<usize>(), any::<bool>())
            .prop_map(|(pick, consumed)| Step::Settle { pick, consumed }),
        1 => (1..=ACCOUNTS).prop_map(Step::Prune),
    ]
}

/// Ledger on a temp directory, with a deployed marketplace and open purchases
struct Harness {
    ledger: TokenLedger,
    marketplace: Arc<InMemoryMarketplace>,
    address: ContractAddress,
    runtime: tokio::runtime::Runtime,
    open: Vec<TxId>,
    _temp: TempDir,
}

/// Create test ledger with temp directory
fn create_test_ledger(tokens: i64) -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.limit_tokens = LIMIT;

    let address = ContractAddress::new("data-channel", "data-marketplace");
    let marketplace = Arc::new(InMemoryMarketplace::new());
    marketplace.deploy(address.clone());

    let ledger = TokenLedger::open(config, marketplace.clone()).unwrap();
    ledger.init_accounts(ACCOUNTS, tokens).unwrap();
    Harness {
        ledger,
        marketplace,
        address,
        runtime: tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap(),
        open: Vec::new(),
        _temp: temp_dir,
    }
}

fn id(n: u32) -> AccountId {
    AccountId::new(n.to_string())
}

fn send(ledger: &TokenLedger, transfer: &Transfer) -> token_ledger::Result<TxId> {
    let (from, to) = (id(transfer.from), id(transfer.to));
    if transfer.safe {
        ledger.send_tokens_safe(from, to, transfer.amount, transfer.purchase)
    } else {
        ledger.send_tokens_fast(from, to, transfer.amount, transfer.purchase)
    }
}

impl Harness {
    fn apply(&mut self, step: &Step) {
        match step {
            // Rejections (same account, insufficient funds) are fine; they write nothing
            Step::Send(transfer) => {
                if let Ok(tx_id) = send(&self.ledger, transfer) {
                    if transfer.purchase {
                        self.open.push(tx_id);
                    }
                }
            }
            Step::Settle { pick, consumed } => {
                if self.open.is_empty() {
                    return;
                }
                let index = pick % self.open.len();
                let tx_id = self.open[index].clone();
                if *consumed {
                    self.marketplace
                        .mark_consumed(&self.address, tx_id.clone())
                        .unwrap();
                    self.open.remove(index);
                }
                let result = self
                    .runtime
                    .block_on(self.ledger.change_pending_tx(&self.address, &tx_id));
                if *consumed {
                    result.unwrap();
                } else {
                    assert!(matches!(result, Err(Error::NotYetConsumed(_))));
                }
            }
            Step::Prune(n) => self.prune_all(&[*n]),
        }
    }

    fn prune_all(&self, accounts: &[u32]) {
        for n in accounts {
            self.ledger.prune_account_tx(&id(*n)).unwrap();
        }
    }

    fn balances(&self) -> Vec<i64> {
        (1..=ACCOUNTS)
            .map(|n| self.ledger.account_tokens(&id(n)).unwrap())
            .collect()
    }

    fn total(&self) -> i64 {
        self.balances().iter().sum()
    }

    /// (incoming, outgoing) escrow over all accounts
    fn escrowed(&self) -> (i64, i64) {
        (1..=ACCOUNTS)
            .map(|n| self.ledger.pending_tokens(&id(n)).unwrap())
            .fold((0, 0), |(i, o), s| (i + s.incoming, o + s.outgoing))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: balances plus open escrow always add up to the seeded supply
    #[test]
    fn prop_conservation(steps in prop::collection::vec(step_strategy(), 1..25)) {
        let mut harness = create_test_ledger(20);
        let before = harness.total();

        for step in &steps {
            harness.apply(step);
            let (incoming, outgoing) = harness.escrowed();
            prop_assert_eq!(incoming, outgoing);
            prop_assert_eq!(harness.total() + outgoing, before);
        }

        let open: i64 = harness
            .open
            .iter()
            .map(|tx_id| harness.ledger.tx_details(tx_id).unwrap().record.amount)
            .sum();
        prop_assert_eq!(harness.escrowed().1, open);
    }

    /// Property: replay is idempotent
    #[test]
    fn prop_idempotent_replay(steps in prop::collection::vec(step_strategy(), 0..15)) {
        let mut harness = create_test_ledger(50);
        for step in &steps {
            harness.apply(step);
        }

        prop_assert_eq!(harness.balances(), harness.balances());
    }

    /// Property: compaction never changes any balance or escrow, before or after settlement
    #[test]
    fn prop_prune_preserves_balance(
        steps in prop::collection::vec(step_strategy(), 1..20),
        pruned in prop::collection::vec(1..=ACCOUNTS, 1..6),
        later in prop::collection::vec(step_strategy(), 0..10),
    ) {
        let mut harness = create_test_ledger(30);
        for step in &steps {
            harness.apply(step);
        }

        let before = (harness.balances(), harness.escrowed());
        harness.prune_all(&pruned);
        prop_assert_eq!(&before, &(harness.balances(), harness.escrowed()));

        for step in &later {
            harness.apply(step);
        }
        let before = (harness.balances(), harness.escrowed());
        harness.prune_all(&pruned);
        prop_assert_eq!(&before, &(harness.balances(), harness.escrowed()));
    }

    /// Property: fast transfers above the ceiling fail regardless of balance
    #[test]
    fn prop_fast_ceiling(amount in (LIMIT + 1)..1_000_000i64) {
        let harness = create_test_ledger(1_000_000);
        let ledger = &harness.ledger;
        let result = ledger.send_tokens_fast(id(1), id(2), amount, false);
        let rejected = matches!(result, Err(Error::TransferLimitExceeded { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(ledger.account_tokens(&id(1)).unwrap(), 1_000_000);
    }

    /// Property: safe transfers succeed exactly when the sender can cover them
    #[test]
    fn prop_safe_guard(balance in 0i64..500, amount in 1i64..1000) {
        let harness = create_test_ledger(balance);
        let ledger = &harness.ledger;
        let result = ledger.send_tokens_safe(id(1), id(2), amount, false);

        if amount > balance {
            let rejected = matches!(result, Err(Error::InsufficientFunds { .. }));
            prop_assert!(rejected);
            prop_assert_eq!(ledger.account_tokens(&id(1)).unwrap(), balance);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(ledger.account_tokens(&id(1)).unwrap(), balance - amount);
            prop_assert_eq!(ledger.account_tokens(&id(2)).unwrap(), balance + amount);
        }
    }
}
