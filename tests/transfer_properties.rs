//! Ledger properties under concurrency, driven through `LedgerService`
//! over the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pairledger::store::{AccountStore, LedgerStore, TransferLog, UnitOfWork};
use pairledger::transfer::Side;
use pairledger::{
    AccountId, Amount, Balance, LedgerService, MemoryLedger, RetryPolicy, TransferError,
    TransferRequest,
};

fn id(v: i64) -> AccountId {
    AccountId::new(v)
}

fn request(source: i64, destination: i64, amount: Decimal) -> TransferRequest {
    TransferRequest::new(id(source), id(destination), Amount::new(amount).unwrap()).unwrap()
}

async fn setup(
    accounts: &[(i64, Decimal)],
    timeout: Duration,
) -> (LedgerService<MemoryLedger>, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let service = LedgerService::new(ledger.clone(), RetryPolicy::default(), timeout);
    for &(account, balance) in accounts {
        service
            .create_account(id(account), Balance::new(balance).unwrap())
            .await
            .unwrap();
    }
    (service, ledger)
}

/// balance(A) == initial(A) + net flow of A over the log
async fn assert_reconciled(ledger: &MemoryLedger, initial: &BTreeMap<AccountId, Decimal>) {
    for (account, balance) in ledger.balances() {
        let net = ledger.net_flow(account).await.unwrap();
        assert_eq!(
            balance,
            initial[&account] + net,
            "account {account} does not reconcile with the log"
        );
    }
}

fn initial_of(accounts: &[(i64, Decimal)]) -> BTreeMap<AccountId, Decimal> {
    accounts.iter().map(|&(a, b)| (id(a), b)).collect()
}

#[tokio::test]
async fn test_example_transfer() {
    let (service, ledger) = setup(&[(1, dec!(1000)), (2, dec!(1000))], Duration::from_secs(5)).await;

    service.transfer(request(1, 2, dec!(100))).await.unwrap();

    let balances = ledger.balances();
    assert_eq!(balances[&id(1)], dec!(900));
    assert_eq!(balances[&id(2)], dec!(1100));

    let records = ledger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        (records[0].source, records[0].destination, records[0].amount.value()),
        (id(1), id(2), dec!(100))
    );
}

#[tokio::test]
async fn test_example_insufficient_funds() {
    let (service, ledger) = setup(&[(1, dec!(1000)), (2, dec!(1000))], Duration::from_secs(5)).await;

    let err = service.transfer(request(1, 2, dec!(5000))).await.unwrap_err();
    assert_eq!(err, TransferError::InsufficientFunds);

    let balances = ledger.balances();
    assert_eq!(balances[&id(1)], dec!(1000));
    assert_eq!(balances[&id(2)], dec!(1000));
    assert!(ledger.records().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conservation_under_concurrent_transfers() {
    let accounts = [(1, dec!(1000)), (2, dec!(1000)), (3, dec!(1000))];
    let (service, ledger) = setup(&accounts, Duration::from_secs(5)).await;

    let pairs: Vec<(i64, i64)> = {
        let mut rng = rand::thread_rng();
        (0..200)
            .map(|_| {
                let source = rng.gen_range(1..=3);
                let destination = (source + rng.gen_range(1..=2) - 1) % 3 + 1;
                (source, destination)
            })
            .collect()
    };

    let tasks = pairs.into_iter().map(|(source, destination)| {
        let service = service.clone();
        tokio::spawn(async move { service.transfer(request(source, destination, dec!(1.0))).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let total: Decimal = ledger.balances().values().copied().sum();
    assert_eq!(total, dec!(3000));
    assert_eq!(ledger.records().len(), 200);
    assert_reconciled(&ledger, &initial_of(&accounts)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_negativity_when_funds_run_out() {
    let accounts = [(1, dec!(5)), (2, dec!(3)), (3, dec!(0)), (4, dec!(1))];
    let (service, ledger) = setup(&accounts, Duration::from_secs(5)).await;

    let jobs: Vec<(i64, i64, Decimal)> = {
        let mut rng = rand::thread_rng();
        (0..300)
            .map(|_| {
                let source = rng.gen_range(1..=4);
                let mut destination = rng.gen_range(1..=4);
                if destination == source {
                    destination = source % 4 + 1;
                }
                let amount = Decimal::new(rng.gen_range(1..=30_000), 4);
                (source, destination, amount)
            })
            .collect()
    };

    let tasks = jobs.into_iter().map(|(source, destination, amount)| {
        let service = service.clone();
        tokio::spawn(async move { service.transfer(request(source, destination, amount)).await })
    });

    let mut succeeded = 0;
    for result in futures::future::join_all(tasks).await {
        match result.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) => assert_eq!(e, TransferError::InsufficientFunds),
        }
    }

    for (account, balance) in ledger.balances() {
        assert!(balance >= Decimal::ZERO, "account {account} went negative: {balance}");
    }
    let total: Decimal = ledger.balances().values().copied().sum();
    assert_eq!(total, dec!(9));
    assert_eq!(ledger.records().len(), succeeded);
    assert_reconciled(&ledger, &initial_of(&accounts)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_deadlock_freedom_over_all_ordered_pairs() {
    let accounts = [(1, dec!(100000)), (2, dec!(100000)), (3, dec!(100000)), (4, dec!(100000))];
    let (service, ledger) = setup(&accounts, Duration::from_secs(5)).await;

    let pairs: Vec<(i64, i64)> = (1..=4)
        .flat_map(|a| (1..=4).filter(move |&b| b != a).map(move |b| (a, b)))
        .collect();
    assert_eq!(pairs.len(), 12);

    let run_for = Duration::from_millis(300);
    let workers = pairs.into_iter().map(|(source, destination)| {
        let service = service.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let mut done = 0u64;
            while started.elapsed() < run_for && done < 2_000 {
                service
                    .transfer(request(source, destination, dec!(1)))
                    .await
                    .unwrap();
                done += 1;
            }
            done
        })
    });

    let completed = tokio::time::timeout(Duration::from_secs(30), futures::future::join_all(workers))
        .await
        .expect("transfers over shared accounts must not deadlock");

    let mut total_done = 0;
    for result in completed {
        total_done += result.unwrap();
    }
    assert!(total_done >= 12);
    assert_eq!(ledger.records().len() as u64, total_done);

    let total: Decimal = ledger.balances().values().copied().sum();
    assert_eq!(total, dec!(400000));
    assert_reconciled(&ledger, &initial_of(&accounts)).await;
}

#[tokio::test]
async fn test_failed_transfer_to_missing_destination_changes_nothing() {
    let (service, ledger) = setup(&[(1, dec!(1000)), (2, dec!(1000))], Duration::from_secs(5)).await;

    let before = ledger.balances();
    for _ in 0..3 {
        let err = service.transfer(request(1, 77, dec!(10))).await.unwrap_err();
        assert_eq!(
            err,
            TransferError::AccountNotFound {
                side: Side::Destination,
                account: id(77)
            }
        );
    }
    assert_eq!(ledger.balances(), before);
    assert!(ledger.records().is_empty());
    assert!(ledger.history(id(1), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_stale_version_recovered_by_retry() {
    let (service, ledger) = setup(&[(1, dec!(1000)), (2, dec!(1000))], Duration::from_secs(5)).await;

    ledger.inject_stale_version(1);
    service.transfer(request(2, 1, dec!(250))).await.unwrap();

    let balances = ledger.balances();
    assert_eq!(balances[&id(1)], dec!(1250));
    assert_eq!(balances[&id(2)], dec!(750));
    assert_eq!(ledger.records().len(), 1);
}

#[tokio::test]
async fn test_terminal_failures_are_stable_across_calls() {
    let (service, ledger) = setup(&[(1, dec!(10)), (2, dec!(10))], Duration::from_secs(5)).await;

    for _ in 0..3 {
        assert_eq!(
            service.transfer(request(1, 2, dec!(10.0001))).await.unwrap_err(),
            TransferError::InsufficientFunds
        );
        assert!(matches!(
            service.transfer(request(5, 2, dec!(1))).await.unwrap_err(),
            TransferError::AccountNotFound {
                side: Side::Source,
                ..
            }
        ));
    }
    assert_eq!(ledger.balances()[&id(1)], dec!(10));
    assert!(ledger.records().is_empty());
}

#[tokio::test]
async fn test_attempt_timeout_releases_nothing_and_is_not_retried() {
    let (service, ledger) = setup(&[(1, dec!(100)), (2, dec!(100))], Duration::from_millis(50)).await;

    // Hold both rows as another writer would
    let mut holder = ledger.begin().await.unwrap();
    holder.lock_and_read_pair(id(1), id(2)).await.unwrap();

    let started = Instant::now();
    let err = service.transfer(request(1, 2, dec!(10))).await.unwrap_err();
    assert_eq!(err, TransferError::Timeout);
    // One attempt only: three would take at least 150ms
    assert!(started.elapsed() < Duration::from_millis(150));

    holder.rollback().await.unwrap();
    assert_eq!(ledger.balances()[&id(1)], dec!(100));
    assert!(ledger.records().is_empty());

    // The abandoned attempt left no lock behind
    service.transfer(request(1, 2, dec!(10))).await.unwrap();
    assert_eq!(ledger.balances()[&id(1)], dec!(90));
}

#[tokio::test]
async fn test_account_lookup_after_transfers() {
    let (service, ledger) = setup(&[(10, dec!(50)), (20, dec!(0))], Duration::from_secs(5)).await;
    service.transfer(request(10, 20, dec!(12.3456))).await.unwrap();

    let account = service.get_account(id(20)).await.unwrap();
    assert_eq!(account.balance.value(), dec!(12.3456));
    assert!(ledger.account_exists(id(10)).await.unwrap());
    assert_eq!(
        service.accounts().get_account(id(10)).await.unwrap().balance.to_string(),
        "37.6544"
    );
}
