//! The unspent-transaction-output engine.
//!
//! Consumes fully-downloaded main-chain blocks strictly in blockid order,
//! verifying every input script, enforcing the coinbase value bound, and
//! maintaining the `unspent` rows. A single persisted scalar,
//! `last_valid_block`, marks how far the set has advanced; a crash
//! between header acceptance and UTXO application is healed on restart by
//! resuming from that scalar.

use std::collections::HashMap;
use std::sync::Arc;

use byteorder::ByteOrder;
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;
use tracing::{debug, warn};

use magpie_chain::parameters::Coin;
use magpie_chain::transaction::{self, Transaction};
use magpie_chain::transparent::{Input, Output};
use magpie_chain::Amount;

use crate::block_store::StoredBlock;
use crate::db::{meta_key, meta_value, utxo_addr_key, utxo_key, ChainDb, META_KEY_LAST_VALID_BLOCK};
use crate::error::{StorageError, TransactionError};
use crate::keys;
use crate::txn_store::TxnStore;

/// One transaction prepared for verification: the transaction itself plus
/// the resolved previous output of every input.
struct VerifyTask<'a> {
    index: usize,
    txn: &'a Transaction,
    /// `(prev_txck, prev_output)` per input; empty for the coinbase.
    prevouts: Vec<(u64, Output)>,
}

/// The per-transaction verification result, reduced in block order.
struct Verdict {
    valid: bool,
    fees: Amount,
    /// Address hint per output.
    address_hints: Vec<u64>,
}

/// The spendable-output store and block-application engine.
pub struct UtxoStore {
    db: Arc<ChainDb>,
    coin: &'static Coin,
    workers: usize,
}

impl UtxoStore {
    pub fn new(
        db: Arc<ChainDb>,
        coin: &'static Coin,
        workers: Option<usize>,
    ) -> Result<UtxoStore, StorageError> {
        let workers = workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        // The genesis block's outputs are never spendable; the engine
        // starts one block past it.
        if db.get_meta(META_KEY_LAST_VALID_BLOCK)?.is_none() {
            db.set_meta(
                META_KEY_LAST_VALID_BLOCK,
                crate::block_store::GENESIS_BLOCKID as u64,
            )?;
        }

        Ok(UtxoStore { db, coin, workers })
    }

    /// The blockid of the last block applied to the UTXO set.
    pub fn last_valid_block(&self) -> Result<u32, StorageError> {
        Ok(self
            .db
            .get_meta(META_KEY_LAST_VALID_BLOCK)?
            .ok_or(StorageError::Corruption("missing last-valid-block"))? as u32)
    }

    /// Whether an output is currently unspent.
    pub fn contains(&self, uock: u64) -> Result<bool, StorageError> {
        Ok(self.db.utxo.get(utxo_key(uock))?.is_some())
    }

    /// The unspent outputs whose address hint matches `address_hint`.
    /// Hints are non-unique; callers must confirm against real data.
    pub fn unspent_by_address_hint(&self, address_hint: u64) -> Result<Vec<u64>, StorageError> {
        let mut prefix = [0u8; 9];
        prefix[0] = b'a';
        byteorder::BigEndian::write_u64(&mut prefix[1..], address_hint);

        let mut uocks = Vec::new();
        for entry in self.db.utxo.scan_prefix(&prefix[..]) {
            let (key, _) = entry?;
            if key.len() != 17 {
                return Err(StorageError::Corruption("address index key length"));
            }
            uocks.push(byteorder::BigEndian::read_u64(&key[9..]));
        }
        Ok(uocks)
    }

    /// Apply the next consecutive block to the UTXO set.
    ///
    /// Fails with `NonConsecutive` unless `block.previous_blockid` equals
    /// `last_valid_block`. On success, every consumed output row is
    /// deleted, every new output row inserted, and `last_valid_block`
    /// advanced, atomically.
    pub fn update(&self, block: &StoredBlock, txns: &TxnStore) -> Result<(), TransactionError> {
        if self.last_valid_block().map_err(TransactionError::Storage)? != block.previous_blockid {
            return Err(TransactionError::NonConsecutive);
        }

        let transactions = txns
            .transactions_for_block(block.blockid)
            .map_err(TransactionError::Storage)?;
        if transactions.is_empty() || transactions.len() != block.txn_count as usize {
            return Err(TransactionError::Storage(StorageError::Corruption(
                "block body is incomplete",
            )));
        }

        // Resolve every input's previous output up front, caching lookups
        // so a transaction chain inside one block hits the store once per
        // distinct txid.
        let mut prev_cache: HashMap<transaction::Hash, (u64, std::sync::Arc<Transaction>)> =
            HashMap::new();
        let mut tasks = Vec::with_capacity(transactions.len());
        for (index, (_txck, txn)) in transactions.iter().enumerate() {
            let mut prevouts = Vec::new();
            if index != 0 {
                for input in &txn.inputs {
                    let outpoint = match input {
                        Input::PrevOut { outpoint, .. } => *outpoint,
                        Input::Coinbase { .. } => {
                            // A coinbase input outside slot 0 spends
                            // nothing and verifies nothing.
                            continue;
                        }
                    };
                    let (prev_txck, prev_txn) = match prev_cache.get(&outpoint.hash) {
                        Some(entry) => entry.clone(),
                        None => {
                            let entry = txns
                                .get(&outpoint.hash)
                                .map_err(TransactionError::Storage)?
                                .ok_or(TransactionError::MissingPrevout {
                                    txid: outpoint.hash,
                                })?;
                            prev_cache.insert(outpoint.hash, entry.clone());
                            entry
                        }
                    };
                    let output = prev_txn
                        .outputs
                        .get(outpoint.index as usize)
                        .ok_or(TransactionError::MissingPrevout {
                            txid: outpoint.hash,
                        })?
                        .clone();
                    prevouts.push((prev_txck, output));
                }
            }
            tasks.push(VerifyTask {
                index,
                txn,
                prevouts,
            });
        }

        // Scripts of different transactions are independent; fan the work
        // out to a bounded pool and reduce the results in block order.
        let verdicts = self.verify_all(&tasks);

        let mut total_fees = Amount::zero();
        for (task, verdict) in tasks.iter().zip(&verdicts) {
            if !verdict.valid {
                warn!(block = %block.hash, index = task.index, "script verification failed");
                return Err(TransactionError::Script { index: task.index });
            }
            if verdict.fees.is_negative() {
                return Err(TransactionError::Fee { index: task.index });
            }
            total_fees = total_fees
                .checked_add(verdict.fees)
                .ok_or(TransactionError::Fee { index: task.index })?;
        }

        // The coinbase may claim the subsidy plus all fees, nothing more.
        // Coinbase maturity (the 100-block spend lock) is deliberately
        // not enforced, following the reference implementation.
        let permitted = self
            .coin
            .block_subsidy(block.height())
            .checked_add(total_fees)
            .ok_or(TransactionError::Coinbase)?;
        let coinbase_out =
            Amount::sum(transactions[0].1.outputs.iter().map(|o| o.value))
                .ok_or(TransactionError::Coinbase)?;
        if coinbase_out > permitted {
            return Err(TransactionError::Coinbase);
        }

        // Net effect, computed in transaction order against an overlay so
        // same-block spends resolve without relying on read-your-writes.
        let mut deletes: Vec<u64> = Vec::new();
        let mut inserts: HashMap<u64, u64> = HashMap::new();
        for (task, verdict) in tasks.iter().zip(&verdicts) {
            // Deletions: each input's previous uock. prevouts is aligned
            // with the PrevOut inputs.
            let mut prevout_iter = task.prevouts.iter();
            for input in &task.txn.inputs {
                if let Input::PrevOut { outpoint, .. } = input {
                    let (prev_txck, _) = prevout_iter
                        .next()
                        .expect("prevouts aligned with inputs");
                    let spent = keys::uock(*prev_txck, outpoint.index)
                        .map_err(TransactionError::Storage)?;
                    if inserts.remove(&spent).is_none() {
                        deletes.push(spent);
                    }
                }
            }
            // Insertions: this transaction's outputs.
            let txck = transactions[task.index].0;
            for (output_index, hint) in verdict.address_hints.iter().enumerate() {
                let new_uock = keys::uock(txck, output_index as u32)
                    .map_err(TransactionError::Storage)?;
                inserts.insert(new_uock, *hint);
            }
        }

        let result = (&self.db.utxo, &self.db.meta).transaction(
            |(utxo, meta): &(
                sled::transaction::TransactionalTree,
                sled::transaction::TransactionalTree,
            )| {
                let last = meta
                    .get(meta_key(META_KEY_LAST_VALID_BLOCK))?
                    .map(|v| byteorder::LittleEndian::read_u64(&v) as u32)
                    .ok_or_else(|| {
                        ConflictableTransactionError::Abort(TransactionError::Storage(
                            StorageError::Corruption("missing last-valid-block"),
                        ))
                    })?;
                if last != block.previous_blockid {
                    return Err(ConflictableTransactionError::Abort(
                        TransactionError::NonConsecutive,
                    ));
                }

                for spent in &deletes {
                    let removed = utxo.remove(&utxo_key(*spent)[..])?;
                    match removed {
                        Some(row) => {
                            let hint = byteorder::LittleEndian::read_u64(&row);
                            utxo.remove(&utxo_addr_key(hint, *spent)[..])?;
                        }
                        None => {
                            return Err(ConflictableTransactionError::Abort(
                                TransactionError::Storage(StorageError::Corruption(
                                    "spent output missing from the unspent set",
                                )),
                            ));
                        }
                    }
                }

                for (new_uock, hint) in &inserts {
                    utxo.insert(&utxo_key(*new_uock)[..], &meta_value(*hint)[..])?;
                    utxo.insert(&utxo_addr_key(*hint, *new_uock)[..], &[][..])?;
                }

                meta.insert(
                    &meta_key(META_KEY_LAST_VALID_BLOCK)[..],
                    &meta_value(block.blockid as u64)[..],
                )?;
                Ok(())
            },
        );

        match result {
            Ok(()) => {
                debug!(
                    block = %block.hash,
                    height = block.height,
                    spent = deletes.len(),
                    created = inserts.len(),
                    fees = total_fees.sat(),
                    "applied block to the unspent set"
                );
                Ok(())
            }
            Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
            Err(sled::transaction::TransactionError::Storage(e)) => {
                Err(TransactionError::Storage(StorageError::Engine(e)))
            }
        }
    }

    /// Undo the most recently applied block.
    ///
    /// Re-creating the spent rows needs the deleted outputs' values,
    /// which would require a journal this store does not keep; the
    /// operation is a documented extension point.
    pub fn rollback(&self, _block: &StoredBlock) -> Result<(), TransactionError> {
        Err(TransactionError::RollbackUnavailable)
    }

    /// Verify every transaction's scripts on a bounded worker pool,
    /// returning verdicts in block order.
    fn verify_all(&self, tasks: &[VerifyTask<'_>]) -> Vec<Verdict> {
        let chunk = tasks.len().div_ceil(self.workers.max(1)).max(1);
        let mut verdicts: Vec<Option<Verdict>> = Vec::new();
        verdicts.resize_with(tasks.len(), || None);

        std::thread::scope(|scope| {
            for (task_chunk, verdict_chunk) in
                tasks.chunks(chunk).zip(verdicts.chunks_mut(chunk))
            {
                scope.spawn(move || {
                    for (task, slot) in task_chunk.iter().zip(verdict_chunk.iter_mut()) {
                        *slot = Some(verify_one(task));
                    }
                });
            }
        });

        verdicts
            .into_iter()
            .map(|verdict| verdict.expect("every verification slot is filled"))
            .collect()
    }
}

/// Verify one transaction: script-check every input against its previous
/// output, sum the fee, and derive address hints for the new outputs.
fn verify_one(task: &VerifyTask<'_>) -> Verdict {
    let address_hints = task
        .txn
        .outputs
        .iter()
        .map(|output| {
            let hash = magpie_script::output_pubkey_hash(&output.pk_script);
            keys::address_hint(hash.as_ref())
        })
        .collect();

    // The coinbase spends nothing and is not script-verified.
    if task.index == 0 {
        return Verdict {
            valid: true,
            fees: Amount::zero(),
            address_hints,
        };
    }

    let sum_in = Amount::sum(task.prevouts.iter().map(|(_, output)| output.value));
    let sum_out = task.txn.output_sum();
    let fees = match (sum_in, sum_out) {
        (Some(sum_in), Some(sum_out)) => match sum_in.checked_sub(sum_out) {
            Some(fees) => fees,
            None => {
                return Verdict {
                    valid: true,
                    fees: Amount::from_sat(-1),
                    address_hints,
                }
            }
        },
        _ => {
            return Verdict {
                valid: false,
                fees: Amount::zero(),
                address_hints,
            }
        }
    };

    let mut prevout_iter = task.prevouts.iter();
    for (input_index, input) in task.txn.inputs.iter().enumerate() {
        if let Input::PrevOut { .. } = input {
            let (_, prev_output) = prevout_iter.next().expect("prevouts aligned with inputs");
            if !magpie_script::verify_input(task.txn, input_index, &prev_output.pk_script) {
                return Verdict {
                    valid: false,
                    fees,
                    address_hints,
                };
            }
        }
    }

    Verdict {
        valid: true,
        fees,
        address_hints,
    }
}
