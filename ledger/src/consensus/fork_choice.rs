//! Fork-choice rule for selecting the best chain among replicas.

use tracing::{debug, warn};

use crate::chain::ChainStore;

/// Which chain a fork-choice rule picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    /// Keep the local chain.
    Local,
    /// Adopt the candidate at this position.
    Candidate(usize),
}

/// Abstraction over fork-choice rules.
///
/// Given the local chain and a set of candidate chains, an implementation
/// decides which one the replica should hold afterwards.
pub trait ForkChoice {
    fn choose(&self, local: &ChainStore, candidates: &[ChainStore]) -> Choice;
}

/// "Longest valid chain" fork choice.
///
/// - Only chains that pass full validation and share the local genesis
///   block are eligible.
/// - Among eligible chains the one with the most blocks wins.
/// - Ties keep the local chain, or the earlier candidate when the local
///   chain is not eligible itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct LongestChainForkChoice;

impl ForkChoice for LongestChainForkChoice {
    fn choose(&self, local: &ChainStore, candidates: &[ChainStore]) -> Choice {
        let genesis = local.genesis().hash;

        let mut best = if local.is_valid() {
            Some((Choice::Local, local.len()))
        } else {
            warn!(len = local.len(), "local chain fails validation");
            None
        };

        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.genesis().hash != genesis {
                debug!(candidate = i, "ignoring chain with a different genesis");
                continue;
            }
            if best.is_some_and(|(_, len)| candidate.len() <= len) {
                continue;
            }
            if !candidate.is_valid() {
                debug!(candidate = i, len = candidate.len(), "ignoring invalid chain");
                continue;
            }
            best = Some((Choice::Candidate(i), candidate.len()));
        }

        best.map_or(Choice::Local, |(choice, _)| choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, Block, BlockHash, Finalizer, Identity, Transaction};

    fn dummy_chain(genesis_ts: u64, len: usize, tag: &str) -> ChainStore {
        let mut chain = ChainStore::new(genesis_ts);
        for i in 1..len as u64 {
            let reward = Transaction::reward(Identity::from(tag), Amount::coins(5), i);
            let block = Block::new(i, i, vec![reward], BlockHash::default(), Finalizer::Nonce(0));
            chain.append(block).expect("append");
        }
        chain
    }

    #[test]
    fn longer_valid_candidate_wins() {
        let local = dummy_chain(0, 3, "a");
        let peers = vec![dummy_chain(0, 5, "b"), dummy_chain(0, 4, "c")];
        assert_eq!(
            LongestChainForkChoice.choose(&local, &peers),
            Choice::Candidate(0)
        );
    }

    #[test]
    fn tie_keeps_local() {
        let local = dummy_chain(0, 4, "a");
        let peers = vec![dummy_chain(0, 4, "b")];
        assert_eq!(LongestChainForkChoice.choose(&local, &peers), Choice::Local);
    }

    #[test]
    fn invalid_or_foreign_candidates_are_skipped() {
        let local = dummy_chain(0, 2, "a");

        let mut corrupt = dummy_chain(0, 9, "b");
        let mut blocks = corrupt.clone().into_blocks();
        blocks[3].transactions[0].amount = Amount::coins(1_000);
        corrupt = ChainStore::from_blocks(blocks).expect("shape");

        let foreign = dummy_chain(42, 9, "c");
        let peers = vec![corrupt, foreign, dummy_chain(0, 3, "d")];

        assert_eq!(
            LongestChainForkChoice.choose(&local, &peers),
            Choice::Candidate(2)
        );
    }

    #[test]
    fn invalid_local_yields_to_any_valid_candidate() {
        let mut blocks = dummy_chain(0, 6, "a").into_blocks();
        blocks[2].timestamp += 1;
        let local = ChainStore::from_blocks(blocks).expect("shape");
        let peers = vec![dummy_chain(0, 2, "b")];

        assert_eq!(
            LongestChainForkChoice.choose(&local, &peers),
            Choice::Candidate(0)
        );
    }
}
