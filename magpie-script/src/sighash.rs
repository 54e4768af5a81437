//! Signature-hash construction: the digest a transaction signature signs.

use std::io::Write;

use magpie_chain::serialization::sha256d;
use magpie_chain::transaction::Transaction;
use magpie_chain::transparent::{Input, OutPoint};
use magpie_chain::{Amount, CompactInt, WireSerialize};

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// One input of the modified transaction, with its script already
/// replaced.
struct RawInput {
    outpoint: OutPoint,
    script: Vec<u8>,
    sequence: u32,
}

/// One output of the modified transaction. SIGHASH_SINGLE blanks outputs
/// to value −1 with an empty script, and SIGHASH_NONE drops them all, so
/// this is looser than a consensus `Output`.
struct RawOutput {
    value: Amount,
    script: Vec<u8>,
}

fn input_parts(input: &Input) -> (OutPoint, u32) {
    match input {
        Input::PrevOut {
            outpoint, sequence, ..
        } => (*outpoint, *sequence),
        Input::Coinbase { sequence, .. } => (OutPoint::null(), *sequence),
    }
}

/// Compute the digest that a signature with `hash_type` commits to, for
/// the input at `input_index` spending under `subscript`.
///
/// Returns `None` for an unrecognized base hash type; the caller treats
/// that as a failed signature check.
pub fn signature_hash(
    transaction: &Transaction,
    input_index: usize,
    subscript: &[u8],
    hash_type: u8,
) -> Option<[u8; 32]> {
    let base = hash_type & 0x1f;

    let mut inputs: Vec<RawInput>;
    let outputs: Vec<RawOutput>;

    match base {
        // SIGHASH_ALL (and the historical 0 encoding): all inputs with
        // blanked scripts, all outputs.
        0 | SIGHASH_ALL => {
            inputs = transaction
                .inputs
                .iter()
                .enumerate()
                .map(|(index, input)| {
                    let (outpoint, sequence) = input_parts(input);
                    RawInput {
                        outpoint,
                        script: if index == input_index {
                            subscript.to_vec()
                        } else {
                            Vec::new()
                        },
                        sequence,
                    }
                })
                .collect();
            outputs = transaction
                .outputs
                .iter()
                .map(|output| RawOutput {
                    value: output.value,
                    script: output.pk_script.0.clone(),
                })
                .collect();
        }
        // SIGHASH_NONE: other inputs also lose their sequence; no outputs.
        SIGHASH_NONE => {
            inputs = blanked_inputs(transaction, input_index, subscript);
            outputs = Vec::new();
        }
        // SIGHASH_SINGLE: outputs truncated past this input's index, the
        // rest blanked to (−1, empty).
        SIGHASH_SINGLE => {
            inputs = blanked_inputs(transaction, input_index, subscript);
            let mut kept = Vec::new();
            for (index, output) in transaction.outputs.iter().enumerate() {
                if kept.len() > input_index {
                    break;
                }
                if index == input_index {
                    kept.push(RawOutput {
                        value: output.value,
                        script: output.pk_script.0.clone(),
                    });
                } else {
                    kept.push(RawOutput {
                        value: Amount::from_sat(-1),
                        script: Vec::new(),
                    });
                }
            }
            outputs = kept;
        }
        _ => return None,
    }

    // ANYONECANPAY: only the current input is committed to; the outputs
    // stay as the base mode left them.
    if hash_type & SIGHASH_ANYONECANPAY != 0 {
        let input = transaction.inputs.get(input_index)?;
        let (outpoint, sequence) = input_parts(input);
        inputs = vec![RawInput {
            outpoint,
            script: subscript.to_vec(),
            sequence,
        }];
    }

    let mut writer = sha256d::Writer::default();
    serialize_modified(
        &mut writer,
        transaction.version,
        &inputs,
        &outputs,
        transaction.lock_time,
        hash_type,
    )
    .expect("hash writer is infallible");
    Some(writer.finish())
}

fn blanked_inputs(transaction: &Transaction, input_index: usize, subscript: &[u8]) -> Vec<RawInput> {
    transaction
        .inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let (outpoint, sequence) = input_parts(input);
            if index == input_index {
                RawInput {
                    outpoint,
                    script: subscript.to_vec(),
                    sequence,
                }
            } else {
                RawInput {
                    outpoint,
                    script: Vec::new(),
                    sequence: 0,
                }
            }
        })
        .collect()
}

fn serialize_modified<W: Write>(
    mut target: W,
    version: u32,
    inputs: &[RawInput],
    outputs: &[RawOutput],
    lock_time: u32,
    hash_type: u8,
) -> Result<(), std::io::Error> {
    version.wire_serialize(&mut target)?;

    CompactInt::from(inputs.len()).wire_serialize(&mut target)?;
    for input in inputs {
        input.outpoint.wire_serialize(&mut target)?;
        input.script.wire_serialize(&mut target)?;
        input.sequence.wire_serialize(&mut target)?;
    }

    CompactInt::from(outputs.len()).wire_serialize(&mut target)?;
    for output in outputs {
        output.value.wire_serialize(&mut target)?;
        output.script.wire_serialize(&mut target)?;
    }

    lock_time.wire_serialize(&mut target)?;
    // The hash type is appended as a full little-endian u32.
    (hash_type as u32).wire_serialize(&mut target)
}
