//! Several replicas finalizing and reconciling against each other.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use ledger::{
    Amount, Balance, ConsensusConfig, ConsensusError, InMemorySnapshotStore,
    JsonFileSnapshotStore, Keypair, Node, ReconcileOutcome, Signer, Transaction, now_millis,
};

fn dummy_node(difficulty: usize) -> Node<InMemorySnapshotStore> {
    Node::open(
        ConsensusConfig::proof_of_work(difficulty),
        InMemorySnapshotStore::new(),
    )
    .expect("open node")
}

fn mine_blocks<S: ledger::SnapshotStore>(node: &Node<S>, miner: &Keypair, n: usize) {
    for _ in 0..n {
        node.finalize(&miner.identity(), &CancellationToken::new())
            .expect("finalize");
    }
}

#[test]
fn shorter_replica_adopts_longer_valid_chain() {
    let a = dummy_node(1);
    let b = dummy_node(1);
    let miner_a = Keypair::generate();
    let miner_b = Keypair::generate();

    mine_blocks(&a, &miner_a, 2);
    mine_blocks(&b, &miner_b, 4);
    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 5);

    let outcome = a.reconcile_from(std::slice::from_ref(&b));
    let ReconcileOutcome::Replaced { replacement, .. } = outcome else {
        panic!("expected the longer chain to be adopted");
    };
    assert_eq!(replacement.previous_len, 3);
    assert_eq!(replacement.new_len, 5);

    assert_eq!(a.chain(), b.chain());
    for who in [miner_a.identity(), miner_b.identity()] {
        assert_eq!(a.balance(&who), a.rescan_balance(&who));
    }
    assert_eq!(a.balance(&miner_a.identity()), Balance::ZERO);

    // B sees nothing longer and keeps its chain.
    assert!(!b.reconcile_from(std::slice::from_ref(&a)).replaced());
}

#[test]
fn tampered_longer_chain_is_ignored() {
    let honest = dummy_node(1);
    let liar = dummy_node(1);
    let miner = Keypair::generate();
    mine_blocks(&honest, &miner, 2);
    mine_blocks(&liar, &miner, 6);

    let mut forged = liar.chain();
    forged[3].transactions[0].amount = Amount::coins(1_000_000);

    let before = honest.tip_hash();
    let outcome = honest.reconcile(vec![forged]);
    assert!(matches!(outcome, ReconcileOutcome::Kept { len: 3 }));
    assert_eq!(honest.tip_hash(), before);
}

#[test]
fn transfer_propagates_through_reconciliation() {
    let a = dummy_node(1);
    let b = dummy_node(1);
    let alice = Keypair::generate();
    let bob = Keypair::generate();

    mine_blocks(&a, &alice, 2);
    let tx = Transaction::transfer(
        &alice,
        bob.identity(),
        Amount::coins(3),
        a.config().minimum_fee,
        None,
        now_millis(),
    );
    a.submit(tx.clone()).expect("accepted");
    mine_blocks(&a, &alice, 1);

    assert!(b.reconcile_from(std::slice::from_ref(&a)).replaced());
    assert_eq!(b.balance(&bob.identity()), Balance::from(Amount::coins(3)));
    assert_eq!(
        b.balance(&alice.identity()),
        Balance(2 * 500_000_000 - 300_000_000 - 10_000_000)
    );

    // Confirmed on the adopted chain: B's own pool never kept a copy.
    assert!(b.pending().iter().all(|p| p.id() != tx.id()));
}

#[test]
fn adoption_drops_orphaned_rewards_and_unfunded_transfers() {
    let a = dummy_node(1);
    let b = dummy_node(1);
    let carol = Keypair::generate();
    let dave = Keypair::generate();
    let bob = Keypair::generate();

    // Carol earns one confirmed reward on A and spends most of it.
    mine_blocks(&a, &carol, 2);
    assert_eq!(a.balance(&carol.identity()), Balance::from(Amount::coins(5)));
    let spend = Transaction::transfer(
        &carol,
        bob.identity(),
        Amount::coins(4),
        a.config().minimum_fee,
        None,
        now_millis(),
    );
    a.submit(spend.clone()).expect("funded on A's chain");
    assert_eq!(a.pending().len(), 2);

    // B's longer chain never paid carol.
    mine_blocks(&b, &dave, 4);
    let ReconcileOutcome::Replaced { replacement, .. } = a.reconcile_from(std::slice::from_ref(&b))
    else {
        panic!("expected B's chain to be adopted");
    };
    assert_eq!(replacement.purged, 0);
    assert_eq!(replacement.evicted, 2);
    assert!(a.pending().is_empty());
    assert_eq!(a.balance(&carol.identity()), Balance::ZERO);
    assert_eq!(a.spendable(&carol.identity()), Balance::ZERO);

    // Nothing from the orphaned branch reaches the next block.
    let next = a
        .finalize(&dave.identity(), &CancellationToken::new())
        .expect("finalize");
    assert!(next.block.transactions.iter().all(|tx| tx.id() != spend.id()));
    for who in [carol.identity(), bob.identity()] {
        assert_eq!(a.balance(&who), Balance::ZERO);
        assert_eq!(a.rescan_balance(&who), Balance::ZERO);
    }
    assert!(a.is_valid());
}

#[test]
fn stake_replicas_finalize_with_weighted_validators() {
    let node = Node::open(
        ConsensusConfig::proof_of_stake(),
        InMemorySnapshotStore::new(),
    )
    .expect("open node");
    let small = Keypair::generate();
    let large = Keypair::generate();
    node.register_validator(small.identity(), Amount::coins(100))
        .expect("register small");
    node.register_validator(large.identity(), Amount::coins(900))
        .expect("register large");

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..5 {
        let outcome = node
            .finalize_selected(&mut rng)
            .expect("finalize")
            .expect("someone selected");
        assert!(outcome.durability.is_persisted());
    }
    assert_eq!(node.len(), 6);
    assert!(node.is_valid());

    let minted = node.balance(&small.identity()).0 + node.balance(&large.identity()).0;
    // Four of the five rewards are confirmed; the last is still pending.
    assert_eq!(minted, 4 * 500_000_000);
}

#[test]
fn file_snapshot_survives_restart() {
    let tmp = TempDir::new().expect("create temp dir");
    let path = tmp.path().join("chain.json");
    let miner = Keypair::generate();

    let tip = {
        let node = Node::open(
            ConsensusConfig::proof_of_work(1),
            JsonFileSnapshotStore::new(&path),
        )
        .expect("open node");
        mine_blocks(&node, &miner, 3);
        node.tip_hash()
    };

    let reopened = Node::open(
        ConsensusConfig::proof_of_work(1),
        JsonFileSnapshotStore::new(&path),
    )
    .expect("reopen node");
    assert_eq!(reopened.len(), 4);
    assert_eq!(reopened.tip_hash(), tip);
    assert_eq!(
        reopened.balance(&miner.identity()),
        Balance::from(Amount::coins(10))
    );
}

#[tokio::test]
async fn chain_replacement_cancels_in_flight_mining() {
    // Difficulty 64 never succeeds, so only cancellation ends the search.
    let stuck = Arc::new(dummy_node(64));
    let peer = dummy_node(0);
    mine_blocks(&peer, &Keypair::generate(), 3);

    let miner = Keypair::generate();
    let task = tokio::spawn(
        stuck
            .clone()
            .mine_pending(miner.identity(), CancellationToken::new()),
    );

    while stuck.mining_in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(stuck.reconcile_from(std::slice::from_ref(&peer)).replaced());

    let result = task.await.expect("join");
    assert!(matches!(result, Err(ConsensusError::Cancelled)));
    assert_eq!(stuck.tip_hash(), peer.tip_hash());
    assert_eq!(stuck.mining_in_flight(), 0);
}
