use fluxscan_chain::block::BlockParseError;
use fluxscan_rpc::RpcError;
use fluxscan_store::StoreError;
use thiserror::Error;

/// An ingestion failure.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A raw block failed to decode; fatal for the batch.
    #[error(transparent)]
    Parse(#[from] BlockParseError),

    /// The daemon could not be reached within the retry budget.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The analytics store rejected a write or read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The parsed block hash disagrees with the daemon-reported hash.
    #[error("block hash mismatch at height {height}: daemon reports {expected}, parsed {actual}")]
    HashMismatch {
        height: u32,
        expected: String,
        actual: String,
    },

    /// A divergence walked back further than the configured safety bound.
    /// Operator intervention is required.
    #[error("reorg exceeds maximum depth {max_depth} below height {from_height}")]
    ReorgTooDeep { from_height: u32, max_depth: u32 },
}

impl IndexError {
    /// Whether the sync loop must halt instead of retrying.
    pub fn is_fatal(&self) -> bool {
        match self {
            IndexError::ReorgTooDeep { .. } => true,
            IndexError::Rpc(error) => !error.is_transient(),
            IndexError::Parse(_) | IndexError::HashMismatch { .. } => true,
            IndexError::Store(_) => false,
        }
    }
}
