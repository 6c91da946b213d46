//! Integration tests exercising the full path:
//! copies on disk → lock → merge → wallet file → readback.
//!
//! These tests wire together the real filesystem stores, the wallet locks
//! and the entrance the way `Node` does, verifying the system end-to-end.

use std::sync::Arc;
use std::time::Duration;

use tally_merge::MergeOptions;
use tally_node::{Node, NodeConfig, NodeError};
use tally_nullables::NullEntrance;
use tally_store::{CopiesStore, WalletStore};
use tally_sync::{SyncEntrance, SyncError, WalletLocks};
use tally_types::{Amount, Score, Timestamp, Txn, Wallet, WalletId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ME: WalletId = WalletId::new(0x5f2e_0001);
const FRIEND: WalletId = WalletId::new(0x5f2e_0002);

fn temp_node() -> (tempfile::TempDir, Node) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = NodeConfig::with_home(dir.path());
    config.lock_timeout_secs = 1;
    let node = Node::new(config).expect("open node");
    (dir, node)
}

fn amount(text: &str) -> Amount {
    text.parse().expect("valid amount")
}

fn txn(id: u64, value: &str, bnf: WalletId) -> Txn {
    Txn::new(id, Timestamp::new(1_700_000_000 + id), amount(value), "nonce", bnf, "test")
}

fn wallet(id: WalletId, txns: Vec<Txn>) -> Wallet {
    Wallet::from_parts(id, "test", Wallet::PROTOCOL, txns).expect("valid ledger")
}

fn add_copy(node: &Node, wallet: &Wallet, host: &str, score: u64) {
    node.copies()
        .add(&wallet.id(), &wallet.to_body(), host, 4096, Score::new(score))
        .expect("add copy");
}

fn null_entrance(dir: &tempfile::TempDir, entrance: NullEntrance, timeout: Duration) -> SyncEntrance<NullEntrance> {
    let locks = Arc::new(WalletLocks::new(dir.path().join("locks"), timeout));
    SyncEntrance::new(entrance, locks)
}

// ---------------------------------------------------------------------------
// 1. Merge scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fake_negative_debit_is_pruned_in_strict_mode() {
    let (_dir, node) = temp_node();
    node.wallets().save(&wallet(ME, vec![txn(1, "-9.99", FRIEND)])).unwrap();
    add_copy(&node, &wallet(ME, vec![]), "peer-a", 1);

    let modified = node.merge(ME, MergeOptions::strict()).await.unwrap();
    assert_eq!(modified, vec![ME]);
    let merged = node.wallets().find(&ME).unwrap().unwrap();
    assert_eq!(merged.balance(), Amount::ZERO);
}

#[tokio::test]
async fn broken_copy_next_to_identical_copy_changes_nothing() {
    let (_dir, node) = temp_node();
    let local = wallet(ME, vec![txn(1, "14.95", FRIEND)]);
    node.wallets().save(&local).unwrap();
    add_copy(&node, &local, "peer-a", 1);
    node.copies()
        .add(&ME, "some garbage", "peer-b", 4096, Score::new(3))
        .unwrap();

    let modified = node.merge(ME, MergeOptions::default()).await.unwrap();
    assert!(modified.is_empty());
    assert_eq!(node.wallets().find(&ME).unwrap().unwrap(), local);
}

#[tokio::test]
async fn quorum_of_copies_is_accepted() {
    let (_dir, node) = temp_node();
    let payment = txn(1, "-3.5", FRIEND);
    node.wallets().save(&wallet(ME, vec![payment.clone()])).unwrap();
    let agreed = wallet(ME, vec![payment, txn(2, "7", FRIEND)]);
    add_copy(&node, &agreed, "peer-a", 2);
    add_copy(&node, &agreed, "peer-b", 2);

    let modified = node.merge(ME, MergeOptions::default()).await.unwrap();
    assert_eq!(modified, vec![ME]);
    let merged = node.wallets().find(&ME).unwrap().unwrap();
    assert_eq!(merged.txns(), agreed.txns());
    assert_eq!(merged.balance(), amount("3.5"));
}

#[tokio::test]
async fn merging_again_is_a_noop() {
    let (dir, _) = temp_node();
    let mut config = NodeConfig::with_home(dir.path());
    config.clean_copies = false;
    let node = Node::new(config).unwrap();

    node.wallets().save(&wallet(ME, vec![])).unwrap();
    let agreed = wallet(ME, vec![txn(1, "1", FRIEND)]);
    add_copy(&node, &agreed, "peer-a", 1);
    add_copy(&node, &agreed, "peer-b", 1);

    assert_eq!(node.merge(ME, MergeOptions::default()).await.unwrap(), vec![ME]);
    assert!(node.merge(ME, MergeOptions::default()).await.unwrap().is_empty());
    assert_eq!(node.copies().all(&ME).unwrap().len(), 2);
}

#[tokio::test]
async fn strict_mode_credit_needs_the_payer_wallet() {
    let (_dir, node) = temp_node();
    node.wallets().save(&wallet(ME, vec![])).unwrap();
    node.wallets()
        .save(&wallet(FRIEND, vec![txn(4, "-2.25", ME)]))
        .unwrap();
    add_copy(&node, &wallet(ME, vec![txn(4, "2.25", FRIEND)]), "peer-a", 1);

    assert_eq!(node.merge(ME, MergeOptions::strict()).await.unwrap(), vec![ME]);
    assert_eq!(node.wallets().find(&ME).unwrap().unwrap().balance(), amount("2.25"));

    // the same claim without a paying wallet is a fake positive
    let stranger = WalletId::new(0x5f2e_0003);
    add_copy(&node, &wallet(ME, vec![txn(4, "2.25", FRIEND), txn(5, "100", stranger)]), "peer-a", 1);
    assert!(node.merge(ME, MergeOptions::strict()).await.unwrap().is_empty());
    assert_eq!(node.wallets().find(&ME).unwrap().unwrap().balance(), amount("2.25"));
}

#[tokio::test]
async fn merge_of_unknown_wallet_with_no_copies_does_nothing() {
    let (_dir, node) = temp_node();
    assert!(node.merge(ME, MergeOptions::default()).await.unwrap().is_empty());
    assert!(node.wallets().find(&ME).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// 2. Push through the synchronized entrance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn push_stores_then_merges() {
    let (_dir, node) = temp_node();
    let body = wallet(ME, vec![txn(1, "5", FRIEND)]).to_body();

    let pushed = node
        .entrance()
        .start(|entrance| async move { entrance.push(ME, body).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pushed, vec![ME]);
    assert!(node.wallets().exists(&ME).unwrap());
    assert_eq!(node.entrance().to_json()["pushes"], 1);

    let again = wallet(ME, vec![txn(1, "5", FRIEND)]).to_body();
    assert!(node.push(&ME.to_string(), again).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_id_is_rejected_before_any_io() {
    let (_dir, node) = temp_node();
    let err = node.push("not-a-wallet-id", "{}").await.unwrap_err();
    assert!(matches!(err, NodeError::Types(_)));
    assert!(!err.is_lock_timeout());
    assert_eq!(std::fs::read_dir(node.config().locks_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn push_of_garbage_is_an_entrance_error() {
    let (_dir, node) = temp_node();
    let err = node.push(&ME.to_string(), "garbage").await.unwrap_err();
    assert!(matches!(err, NodeError::Sync(SyncError::Entrance(_))));
    assert!(!node.locks().is_locked(&ME).await);
}

// ---------------------------------------------------------------------------
// 3. Lock behaviour
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pushes_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let sync = null_entrance(
        &dir,
        NullEntrance::with_delay(Duration::from_millis(20)),
        Duration::from_secs(10),
    );

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let sync = sync.clone();
            tokio::spawn(async move { sync.push(ME, format!("body-{i}")).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), vec![ME]);
    }

    assert_eq!(sync.inner().calls(), 8);
    assert_eq!(sync.inner().max_overlap(), 1);
    assert_eq!(sync.inner().pushed().len(), 8);
}

#[tokio::test]
async fn held_wallet_times_out_and_mutates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sync = null_entrance(&dir, NullEntrance::new(), Duration::from_millis(100));

    let holder = sync.locks().lock(ME).await.unwrap();
    let err = sync.push(ME, "late").await.unwrap_err();
    assert!(matches!(err, SyncError::LockTimeout { id, .. } if id == ME));
    assert_eq!(sync.inner().calls(), 0);

    drop(holder);
    assert_eq!(sync.push(ME, "on time").await.unwrap(), vec![ME]);
}

#[tokio::test]
async fn panicking_entrance_does_not_leave_wallet_locked() {
    let dir = tempfile::tempdir().unwrap();
    let sync = null_entrance(&dir, NullEntrance::panicking(), Duration::from_millis(200));

    for _ in 0..2 {
        let err = sync.push(ME, "boom").await.unwrap_err();
        assert!(matches!(err, SyncError::Aborted(_)));
    }
    assert_eq!(sync.inner().calls(), 2);
    assert!(!sync.locks().is_locked(&ME).await);
}

#[tokio::test]
async fn second_node_on_same_home_waits_for_the_first() {
    let (dir, first) = temp_node();
    let mut config = NodeConfig::with_home(dir.path());
    config.lock_timeout_secs = 0;
    let second = Node::new(config).unwrap();

    let held = first.locks().lock(ME).await.unwrap();
    let err = second.merge(ME, MergeOptions::default()).await.unwrap_err();
    assert!(err.is_lock_timeout());

    drop(held);
    assert!(second.merge(ME, MergeOptions::default()).await.is_ok());
}

// ---------------------------------------------------------------------------
// 4. Copies arriving while merges run
// ---------------------------------------------------------------------------

fn shared_node(dir: &tempfile::TempDir, clean_copies: bool) -> Arc<Node> {
    let mut config = NodeConfig::with_home(dir.path());
    config.lock_timeout_secs = 30;
    config.clean_copies = clean_copies;
    Arc::new(Node::new(config).expect("open node"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn copies_added_during_merges_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let node = shared_node(&dir, false);
    let body = wallet(ME, vec![txn(1, "2", FRIEND)]).to_body();

    let mut tasks = Vec::new();
    for host in 0..8u16 {
        let (node, body) = (Arc::clone(&node), body.clone());
        tasks.push(tokio::spawn(async move {
            for round in 0..5u64 {
                node.add_copy(ME, body.clone(), format!("host-{host}"), 4096, Score::new(round))
                    .await?;
            }
            Ok::<_, NodeError>(())
        }));
    }
    for _ in 0..4 {
        let node = Arc::clone(&node);
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                node.merge(ME, MergeOptions::default()).await?;
            }
            Ok(())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let copies = node.copies().all(&ME).unwrap();
    assert_eq!(copies.len(), 8);
    assert!(copies.iter().all(|c| c.body == body && c.score == Score::new(4)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleaning_merges_never_lose_a_later_copy() {
    let dir = tempfile::tempdir().unwrap();
    let node = shared_node(&dir, true);
    let agreed = wallet(ME, vec![txn(1, "2", FRIEND)]);

    let mut tasks = Vec::new();
    for host in 0..8u16 {
        let (adder, body) = (Arc::clone(&node), agreed.to_body());
        tasks.push(tokio::spawn(async move {
            adder.add_copy(ME, body, format!("host-{host}"), 4096, Score::new(1)).await
        }));
        let node = Arc::clone(&node);
        tasks.push(tokio::spawn(async move {
            node.merge(ME, MergeOptions::default()).await.map(drop)
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // whatever no merge consumed yet is still intact on disk
    let left = node.copies().all(&ME).unwrap();
    assert!(left.iter().all(|c| c.body == agreed.to_body()));

    node.add_copy(ME, agreed.to_body(), "late-a", 4096, Score::new(1)).await.unwrap();
    node.add_copy(ME, agreed.to_body(), "late-b", 4096, Score::new(1)).await.unwrap();
    node.merge(ME, MergeOptions::default()).await.unwrap();
    assert_eq!(node.wallets().find(&ME).unwrap().unwrap().txns(), agreed.txns());
    assert!(node.copies().all(&ME).unwrap().is_empty());
}

#[tokio::test]
async fn copies_of_extreme_amounts_cannot_take_the_node_down() {
    let (_dir, node) = temp_node();
    let max = i64::MAX;
    let hostile = format!(
        r#"{{"id":"{ME}","network":"test","protocol":2,"txns":[
            {{"id":1,"time":1,"amount":{max},"prefix":"p","bnf":"{FRIEND}"}},
            {{"id":2,"time":2,"amount":{max},"prefix":"p","bnf":"{FRIEND}"}}]}}"#
    );
    for host in ["a", "b"] {
        node.add_copy(ME, hostile.clone(), host, 4096, Score::new(9)).await.unwrap();
    }

    assert!(node.merge(ME, MergeOptions::default()).await.unwrap().is_empty());
    assert!(node.wallets().find(&ME).unwrap().is_none());
    assert!(!node.locks().is_locked(&ME).await);
}
