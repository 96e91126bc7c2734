//! Block validity predicates used by the chain store.

use crate::types::Block;

use super::error::ValidationError;

/// Pluggable validity predicate for a block given its predecessor.
///
/// Implementations should be deterministic and side-effect free. The chain
/// store walks every block after genesis and stops at the first error.
pub trait BlockValidator {
    fn validate(&self, previous: &Block, block: &Block) -> Result<(), ValidationError>;
}

/// Runs `validator` over every block after genesis, short-circuiting on
/// the first failure.
pub fn validate_chain<V>(validator: &V, blocks: &[Block]) -> Result<(), ValidationError>
where
    V: BlockValidator + ?Sized,
{
    for pair in blocks.windows(2) {
        validator.validate(&pair[0], &pair[1])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::error::IntegrityCheck;

    /// Rejects every block at or above a given index.
    struct RejectFrom(u64);

    impl BlockValidator for RejectFrom {
        fn validate(&self, _previous: &Block, block: &Block) -> Result<(), ValidationError> {
            if block.index >= self.0 {
                return Err(ValidationError {
                    index: block.index,
                    check: IntegrityCheck::Hash,
                });
            }
            Ok(())
        }
    }

    fn blocks(n: u64) -> Vec<Block> {
        (0..n)
            .map(|i| {
                let mut b = Block::genesis(i);
                b.index = i;
                b
            })
            .collect()
    }

    #[test]
    fn genesis_alone_is_never_checked() {
        assert!(validate_chain(&RejectFrom(0), &blocks(1)).is_ok());
        assert!(validate_chain(&RejectFrom(0), &[]).is_ok());
    }

    #[test]
    fn first_failure_wins() {
        let err = validate_chain(&RejectFrom(2), &blocks(5)).unwrap_err();
        assert_eq!(err.index, 2);
    }

    #[test]
    fn block_validator_trait_is_object_safe() {
        let v: &dyn BlockValidator = &RejectFrom(10);
        assert!(validate_chain(v, &blocks(3)).is_ok());
    }
}
