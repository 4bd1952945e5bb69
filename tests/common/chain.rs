//! Block construction helpers and [`HashBlockCodec`], the [`BlockCodec`] used by the integration tests.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use chainsync_rs::{
    chain_index::{
        accessors::{internal::ChainIndexSingleton, public::ChainIndexCamera},
        pluggables::KVStore,
    },
    codec::{BlockCodec, CodecError},
    types::{
        block::{Block, BlockMeta},
        data_types::{BlockId, ChainDate, Payload, PayloadKind},
    },
};

use crate::common::mem_db::MemDB;

/// Create a fresh chain index over an empty [`MemDB`], returning its writer, a camera, and the store.
pub(crate) fn empty_chain_index() -> (ChainIndexSingleton<MemDB>, ChainIndexCamera<MemDB>, MemDB) {
    let db = MemDB::new();
    (
        ChainIndexSingleton::new(db.clone()),
        ChainIndexCamera::new(db.clone()),
        db,
    )
}

/// The genesis block used by every test: date 0.0, content `"genesis"`.
pub(crate) fn genesis() -> Block {
    make_block(None, ChainDate::new(0, 0), b"genesis".to_vec())
}

/// A child of `parent` dated one slot later, whose content is `tag`.
///
/// Children of the same parent with different tags are different blocks, which is how tests build forks.
pub(crate) fn child(parent: &Block, tag: &str) -> Block {
    let date = ChainDate::new(parent.date.epoch, parent.date.slot + 1);
    make_block(Some(parent.id), date, tag.as_bytes().to_vec())
}

pub(crate) fn make_block(parent: Option<BlockId>, date: ChainDate, content: Vec<u8>) -> Block {
    let mut hasher = Sha256::new();
    if let Some(parent) = parent {
        hasher.update(parent.bytes());
    }
    hasher.update(date.epoch.to_le_bytes());
    hasher.update(date.slot.to_le_bytes());
    hasher.update(&content);
    Block::new(BlockId::new(hasher.finalize().into()), parent, date, content)
}

/// Initialize the chain index with genesis, then append `length` blocks on top of it.
///
/// Returns every block from genesis to the tip, oldest first.
pub(crate) fn build_chain<K: KVStore>(
    chain_index: &mut ChainIndexSingleton<K>,
    length: usize,
    tag: &str,
) -> Vec<Block> {
    let genesis = genesis();
    chain_index.initialize(&genesis, &None).unwrap();

    let mut blocks = vec![genesis];
    extend(chain_index, &mut blocks, length, tag);
    blocks
}

/// Append `count` blocks on top of the last block of `blocks`, pushing them onto `blocks`.
pub(crate) fn extend<K: KVStore>(
    chain_index: &mut ChainIndexSingleton<K>,
    blocks: &mut Vec<Block>,
    count: usize,
    tag: &str,
) {
    for i in 0..count {
        let block = child(blocks.last().unwrap(), &format!("{}-{}", tag, blocks.len() + i));
        chain_index.append(&block, &None).unwrap();
        blocks.push(block);
    }
}

/// The header payload produced by [`HashBlockCodec`].
#[derive(Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct TestHeader {
    pub(crate) id: BlockId,
    pub(crate) parent: Option<BlockId>,
    pub(crate) chain_length: u64,
    pub(crate) date: ChainDate,
    pub(crate) content_digest: [u8; 32],
}

/// Serializes full blocks as their stored content, and headers as a Borsh-encoded [`TestHeader`].
pub(crate) struct HashBlockCodec;

impl BlockCodec for HashBlockCodec {
    fn encode(
        &self,
        meta: &BlockMeta,
        content: &[u8],
        kind: PayloadKind,
    ) -> Result<Payload, CodecError> {
        match kind {
            PayloadKind::Block => Ok(Payload::new(kind, content.to_vec())),
            PayloadKind::Header => {
                let header = TestHeader {
                    id: meta.id,
                    parent: meta.parent,
                    chain_length: meta.chain_length.int(),
                    date: meta.date,
                    content_digest: Sha256::digest(content).into(),
                };
                let bytes = header.try_to_vec().map_err(|err| CodecError::Malformed {
                    reason: err.to_string(),
                })?;
                Ok(Payload::new(kind, bytes))
            }
        }
    }
}

/// Decode a header payload produced by [`HashBlockCodec`].
pub(crate) fn decode_header(payload: &Payload) -> TestHeader {
    assert_eq!(payload.kind, PayloadKind::Header);
    TestHeader::deserialize(&mut payload.content.as_slice()).unwrap()
}

/// A codec that fails to serialize one particular block, and serializes every other block as
/// [`HashBlockCodec`] does.
pub(crate) struct CorruptBlockCodec(pub(crate) BlockId);

impl BlockCodec for CorruptBlockCodec {
    fn encode(
        &self,
        meta: &BlockMeta,
        content: &[u8],
        kind: PayloadKind,
    ) -> Result<Payload, CodecError> {
        if meta.id == self.0 {
            return Err(CodecError::Malformed {
                reason: String::from("corrupt block content"),
            });
        }
        HashBlockCodec.encode(meta, content, kind)
    }
}

/// A codec that refuses to serialize headers, for checking that codec failures surface as stream items.
pub(crate) struct BlocksOnlyCodec;

impl BlockCodec for BlocksOnlyCodec {
    fn encode(
        &self,
        _meta: &BlockMeta,
        content: &[u8],
        kind: PayloadKind,
    ) -> Result<Payload, CodecError> {
        match kind {
            PayloadKind::Block => Ok(Payload::new(kind, content.to_vec())),
            PayloadKind::Header => Err(CodecError::UnsupportedKind { kind }),
        }
    }
}
