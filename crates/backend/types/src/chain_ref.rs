//! Contains the [`ChainRef`] type.

use crate::ChainRefError;
use alloy_eips::{BlockId, BlockNumberOrTag, RpcBlockHash};
use alloy_primitives::B256;
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// A reference to a position in the chain.
///
/// Symbolic tags are kept distinct from concrete numbers so that pending, safe and finalized
/// semantics are never satisfied by a literal number match. The canonical-membership
/// requirement only exists for hash references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BlockId", into = "BlockId")]
pub enum ChainRef {
    /// The head of the canonical chain.
    #[default]
    Latest,
    /// The block currently being assembled on top of the head.
    Pending,
    /// The consensus safe head.
    Safe,
    /// The consensus finalized head.
    Finalized,
    /// The canonical block at the given height.
    Number(u64),
    /// The block with the given hash.
    Hash {
        /// The block hash.
        hash: B256,
        /// Whether the block must be part of the canonical chain.
        require_canonical: bool,
    },
}

impl ChainRef {
    /// Returns a hash reference that accepts non-canonical blocks.
    pub const fn hash(hash: B256) -> Self {
        Self::Hash { hash, require_canonical: false }
    }

    /// Returns a hash reference that only resolves while the block is canonical.
    pub const fn canonical_hash(hash: B256) -> Self {
        Self::Hash { hash, require_canonical: true }
    }

    /// Builds a reference from its raw request parts.
    ///
    /// Exactly one of `number` and `hash` must be set. `require_canonical` is ignored for
    /// number references.
    pub fn from_parts(
        number: Option<BlockNumberOrTag>,
        hash: Option<B256>,
        require_canonical: bool,
    ) -> Result<Self, ChainRefError> {
        match (number, hash) {
            (Some(number), None) => Ok(number.into()),
            (None, Some(hash)) => Ok(Self::Hash { hash, require_canonical }),
            (None, None) => Err(ChainRefError::Missing),
            (Some(_), Some(_)) => Err(ChainRefError::Conflicting),
        }
    }

    /// Returns `true` if this is the [`ChainRef::Pending`] tag.
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<BlockNumberOrTag> for ChainRef {
    fn from(tag: BlockNumberOrTag) -> Self {
        match tag {
            BlockNumberOrTag::Latest => Self::Latest,
            BlockNumberOrTag::Pending => Self::Pending,
            BlockNumberOrTag::Safe => Self::Safe,
            BlockNumberOrTag::Finalized => Self::Finalized,
            BlockNumberOrTag::Earliest => Self::Number(0),
            BlockNumberOrTag::Number(number) => Self::Number(number),
        }
    }
}

impl From<BlockId> for ChainRef {
    fn from(id: BlockId) -> Self {
        match id {
            BlockId::Number(tag) => tag.into(),
            BlockId::Hash(RpcBlockHash { block_hash, require_canonical }) => {
                let require_canonical = require_canonical.unwrap_or(false);
                Self::Hash { hash: block_hash, require_canonical }
            }
        }
    }
}

impl From<B256> for ChainRef {
    fn from(hash: B256) -> Self {
        Self::hash(hash)
    }
}

impl From<u64> for ChainRef {
    fn from(number: u64) -> Self {
        Self::Number(number)
    }
}

impl From<ChainRef> for BlockId {
    fn from(reference: ChainRef) -> Self {
        match reference {
            ChainRef::Latest => Self::Number(BlockNumberOrTag::Latest),
            ChainRef::Pending => Self::Number(BlockNumberOrTag::Pending),
            ChainRef::Safe => Self::Number(BlockNumberOrTag::Safe),
            ChainRef::Finalized => Self::Number(BlockNumberOrTag::Finalized),
            ChainRef::Number(number) => Self::Number(BlockNumberOrTag::Number(number)),
            ChainRef::Hash { hash, require_canonical } => Self::Hash(RpcBlockHash {
                block_hash: hash,
                require_canonical: require_canonical.then_some(true),
            }),
        }
    }
}

impl FromStr for ChainRef {
    type Err = ChainRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockId::from_str(s)
            .map(Into::into)
            .map_err(|err| ChainRefError::Malformed(err.to_string()))
    }
}

impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Pending => f.write_str("pending"),
            Self::Safe => f.write_str("safe"),
            Self::Finalized => f.write_str("finalized"),
            Self::Number(number) => write!(f, "{number:#x}"),
            Self::Hash { hash, require_canonical: false } => write!(f, "{hash}"),
            Self::Hash { hash, require_canonical: true } => write!(f, "{hash} (canonical)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("latest", ChainRef::Latest)]
    #[case("pending", ChainRef::Pending)]
    #[case("safe", ChainRef::Safe)]
    #[case("finalized", ChainRef::Finalized)]
    #[case("earliest", ChainRef::Number(0))]
    #[case("0x10", ChainRef::Number(16))]
    fn test_parse_tags_and_numbers(#[case] input: &str, #[case] expected: ChainRef) {
        assert_eq!(input.parse::<ChainRef>().unwrap(), expected);
    }

    #[test]
    fn test_parse_hash() {
        let hash = B256::repeat_byte(0xab);
        let parsed: ChainRef = hash.to_string().parse().unwrap();
        assert_eq!(parsed, ChainRef::hash(hash));
    }

    #[test]
    fn test_parse_malformed() {
        let err = "not-a-block".parse::<ChainRef>().unwrap_err();
        assert!(matches!(err, ChainRefError::Malformed(_)));
    }

    #[test]
    fn test_from_parts() {
        let hash = B256::repeat_byte(1);
        assert_eq!(
            ChainRef::from_parts(Some(BlockNumberOrTag::Safe), None, true).unwrap(),
            ChainRef::Safe
        );
        assert_eq!(
            ChainRef::from_parts(None, Some(hash), true).unwrap(),
            ChainRef::canonical_hash(hash)
        );
        assert_eq!(ChainRef::from_parts(None, None, false).unwrap_err(), ChainRefError::Missing);
        assert_eq!(
            ChainRef::from_parts(Some(BlockNumberOrTag::Number(1)), Some(hash), false).unwrap_err(),
            ChainRefError::Conflicting
        );
    }

    #[test]
    fn test_block_id_conversion_keeps_canonical_flag() {
        let hash = B256::repeat_byte(7);
        let id = BlockId::Hash(RpcBlockHash { block_hash: hash, require_canonical: Some(true) });
        let reference = ChainRef::from(id);
        assert_eq!(reference, ChainRef::canonical_hash(hash));
        assert_eq!(BlockId::from(reference), id);

        let id = BlockId::Hash(RpcBlockHash { block_hash: hash, require_canonical: None });
        assert_eq!(ChainRef::from(id), ChainRef::hash(hash));
    }

    #[test]
    fn test_serde_uses_block_id_format() {
        let json = serde_json::to_string(&ChainRef::Finalized).unwrap();
        assert_eq!(json, r#""finalized""#);

        let parsed: ChainRef = serde_json::from_str(r#""0x2a""#).unwrap();
        assert_eq!(parsed, ChainRef::Number(42));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChainRef::Number(255).to_string(), "0xff");
        assert_eq!(ChainRef::Pending.to_string(), "pending");
        let hash = B256::ZERO;
        assert!(ChainRef::canonical_hash(hash).to_string().ends_with("(canonical)"));
    }
}
