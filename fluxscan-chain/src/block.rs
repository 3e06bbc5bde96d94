//! Blocks and block-related structures.

mod hash;
mod header;
mod height;

#[cfg(any(test, feature = "generate"))]
pub mod generate;


use std::collections::HashMap;

use thiserror::Error;

use crate::{
    fluxnode::OperationKind,
    parameters::NetworkParams,
    serialization::{ByteCursor, ParseError},
    transaction::{self, Transaction},
};

pub use hash::Hash;
pub use header::{Header, HeaderAuth};
pub use height::Height;

/// The sanity cap on the transaction count of a single block.
const MAX_BLOCK_TX_COUNT: u64 = 100_000;

/// A decoding failure, located at a block.
#[derive(Error, Debug)]
#[error("block at height {height:?} failed to parse: {source}")]
pub struct BlockParseError {
    pub height: Option<Height>,
    #[source]
    pub source: ParseError,
}

/// One transaction recovered from a raw block, with the byte span it
/// occupied so its exact hex can be sliced back out without re-fetching.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedTransaction {
    /// The daemon-visible txid: double-SHA256 of the raw slice, or the
    /// signature-excluded hash for fluxnode operations.
    pub txid: transaction::Hash,
    /// Byte offset of this transaction within the raw block.
    pub offset: usize,
    /// Serialized length in bytes.
    pub len: usize,
    pub version: u32,
    pub node_op: Option<OperationKind>,
    pub transaction: Transaction,
}

impl ParsedTransaction {
    /// The exact bytes of this transaction within its raw block.
    pub fn raw_slice<'a>(&self, block_bytes: &'a [u8]) -> &'a [u8] {
        &block_bytes[self.offset..self.offset + self.len]
    }

    /// The exact hex of this transaction within its raw block.
    pub fn raw_hex(&self, block_bytes: &[u8]) -> String {
        hex::encode(self.raw_slice(block_bytes))
    }
}

/// A parsed block: header, own hash, and every transaction with its
/// byte-slice location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    pub hash: Hash,
    pub header: Header,
    /// Serialized header length, which is also the offset of the
    /// transaction-count varint.
    pub header_len: usize,
    pub transactions: Vec<ParsedTransaction>,
}

impl Block {
    /// Decode a raw block.
    ///
    /// The walk is all-or-nothing: any transaction failing to decode fails
    /// the whole block, and leftover bytes after the last transaction are
    /// an error. A parser that silently skipped either would desynchronize
    /// every downstream record stream.
    pub fn parse(
        bytes: &[u8],
        params: &NetworkParams,
        expected_height: Option<Height>,
    ) -> Result<Self, BlockParseError> {
        Self::parse_inner(bytes, params, expected_height).map_err(|source| BlockParseError {
            height: expected_height,
            source,
        })
    }

    fn parse_inner(
        bytes: &[u8],
        params: &NetworkParams,
        expected_height: Option<Height>,
    ) -> Result<Self, ParseError> {
        let mut cursor = ByteCursor::new(bytes);

        let header = Header::parse(&mut cursor, params, expected_height)?;
        let header_len = cursor.position();
        let hash = Hash::of(&bytes[..header_len]);

        let tx_count = cursor.read_count(MAX_BLOCK_TX_COUNT, "transaction count")?;
        let mut transactions = Vec::with_capacity(tx_count.min(1024));

        for _ in 0..tx_count {
            let offset = cursor.position();
            let transaction = Transaction::parse(&mut cursor)?;
            let len = cursor.position() - offset;

            let txid = match transaction.node_txid() {
                Some(txid) => txid,
                None => transaction::Hash::of(&bytes[offset..offset + len]),
            };

            transactions.push(ParsedTransaction {
                txid,
                offset,
                len,
                version: transaction.version(),
                node_op: transaction.node_op_kind(),
                transaction,
            });
        }

        if !cursor.is_empty() {
            return Err(ParseError::TrailingBytes {
                extra: cursor.remaining(),
            });
        }

        Ok(Block {
            hash,
            header,
            header_len,
            transactions,
        })
    }

    /// The coinbase transaction, when the block has one in first position.
    pub fn coinbase(&self) -> Option<&ParsedTransaction> {
        self.transactions
            .first()
            .filter(|parsed| parsed.transaction.is_coinbase())
    }

    /// Per-block raw-hex map keyed by txid.
    ///
    /// Covers the transactions whose raw form the daemon's JSON omits,
    /// such as fluxnode operations.
    pub fn tx_hex_map(&self, block_bytes: &[u8]) -> HashMap<transaction::Hash, String> {
        self.transactions
            .iter()
            .map(|parsed| (parsed.txid, parsed.raw_hex(block_bytes)))
            .collect()
    }
}
