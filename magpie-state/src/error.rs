use thiserror::Error;

/// A fatal storage problem. Nothing above the stores recovers from these;
/// the daemon flushes and exits.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),
    #[error("storage corruption: {0}")]
    Corruption(&'static str),
    #[error("database schema version {found} (expected {expected})")]
    VersionMismatch { found: u64, expected: u64 },
}

/// A consensus failure while accepting a block header or block body.
/// Contained at the peer boundary: the peer is penalized and the block
/// rejected.
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block proof-of-work is greater than target")]
    Work,
    #[error("previous block does not exist")]
    Orphan,
    #[error("merkle root does not match block header")]
    Merkle,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A consensus failure while applying a block to the UTXO set.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction {index} failed script verification")]
    Script { index: usize },
    #[error("input value is less than output value in transaction {index}")]
    Fee { index: usize },
    #[error("coinbase output exceeds subsidy plus fees")]
    Coinbase,
    #[error("block does not follow the last valid block")]
    NonConsecutive,
    #[error("missing previous output: {txid}")]
    MissingPrevout { txid: magpie_chain::transaction::Hash },
    #[error("rollback requires a value journal, which is not kept")]
    RollbackUnavailable,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sled::Error> for BlockError {
    fn from(e: sled::Error) -> Self {
        BlockError::Storage(StorageError::Engine(e))
    }
}

impl From<sled::Error> for TransactionError {
    fn from(e: sled::Error) -> Self {
        TransactionError::Storage(StorageError::Engine(e))
    }
}
