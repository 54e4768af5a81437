//! The script interpreter.

use lazy_static::lazy_static;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, VerifyOnly};
use tracing::trace;

use magpie_chain::transaction::Transaction;
use magpie_chain::transparent::{Input, Script};

use crate::num::ByteVector;
use crate::opcodes::*;
use crate::sighash::signature_hash;
use crate::templates;
use crate::tokenizer::{Token, Tokenizer};

/// Combined main + alt stack depth limit.
const MAX_STACK_DEPTH: usize = 1000;

lazy_static! {
    static ref SECP: Secp256k1<VerifyOnly> = Secp256k1::verification_only();
}

/// Verify one input of `transaction` against the `pk_script` of the output
/// it spends. Coinbase inputs are never script-verified and must not be
/// passed here.
pub fn verify_input(transaction: &Transaction, input_index: usize, pk_script: &Script) -> bool {
    let signature_script = match transaction.inputs.get(input_index) {
        Some(Input::PrevOut {
            signature_script, ..
        }) => signature_script,
        _ => return false,
    };
    evaluate(
        signature_script.as_bytes(),
        pk_script.as_bytes(),
        transaction,
        input_index,
    )
}

/// Run `signature_script` followed by `pk_script` on one stack and report
/// whether the script succeeded.
///
/// Every failure mode (malformed script, stack underflow, disabled
/// opcode, failed signature) produces `false`; nothing here is an error
/// for the caller to handle.
pub fn evaluate(
    signature_script: &[u8],
    pk_script: &[u8],
    transaction: &Transaction,
    input_index: usize,
) -> bool {
    run(signature_script, pk_script, transaction, input_index).unwrap_or(false)
}

/// The machine itself. `None` is any abort; `Some(v)` is the truthiness of
/// the final stack top.
fn run(
    signature_script: &[u8],
    pk_script: &[u8],
    transaction: &Transaction,
    input_index: usize,
) -> Option<bool> {
    // Tokenize with the code-separator marker reset to the junction
    // between the two scripts.
    let mut tokens = Tokenizer::new(signature_script, true).ok()?;
    let signature_length = tokens.len();
    tokens.append(pk_script).ok()?;
    let mut last_codeseparator = signature_length;

    // VERIF and VERNOTIF poison the script even inside a skipped branch.
    if tokens
        .opcodes()
        .any(|op| op == OP_VERIF || op == OP_VERNOTIF)
    {
        return None;
    }

    // Stack of entered branch conditions.
    let mut ifstack: Vec<bool> = Vec::new();

    let mut stack: Vec<ByteVector> = Vec::new();
    let mut altstack: Vec<ByteVector> = Vec::new();

    for pc in 0..tokens.len() {
        let opcode = tokens.get(pc).opcode;

        if stack.len() + altstack.len() > MAX_STACK_DEPTH {
            return None;
        }

        // Branch bookkeeping happens before the skip check, so inner
        // conditionals are tracked (and their conditions consumed) even
        // inside an unexecuted branch.
        match opcode {
            OP_IF => {
                ifstack.push(stack.pop()?.is_true());
            }
            OP_NOTIF => {
                ifstack.push(!stack.pop()?.is_true());
            }
            OP_ELSE => {
                let top = ifstack.pop()?;
                ifstack.push(!top);
            }
            OP_ENDIF => {
                ifstack.pop()?;
            }
            _ => {}
        }

        // In a branch with a false condition, skip everything else.
        if ifstack.contains(&false) {
            continue;
        }

        match opcode {
            OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF => {}

            OP_LITERAL => stack.push(tokens.get(pc).value.clone()?),

            // Flow control
            OP_NOP => {}
            OP_VERIFY => {
                if stack.last()?.is_true() {
                    stack.pop()?;
                } else {
                    return None;
                }
            }
            OP_RETURN => return None,

            // Stack operations
            OP_TOALTSTACK => altstack.push(stack.pop()?),
            OP_FROMALTSTACK => stack.push(altstack.pop()?),
            OP_IFDUP => {
                let top = stack.last()?;
                if top.is_true() {
                    stack.push(top.clone());
                }
            }
            OP_DEPTH => {
                let depth = stack.len() as i64;
                stack.push(ByteVector::from_int(depth));
            }
            OP_DROP => {
                stack.pop()?;
            }
            OP_DUP => {
                let top = stack.last()?.clone();
                stack.push(top);
            }
            OP_NIP => {
                let (_x1, x2) = pop2(&mut stack)?;
                stack.push(x2);
            }
            OP_OVER => {
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(x1.clone());
                stack.push(x2);
                stack.push(x1);
            }
            OP_PICK | OP_ROLL => {
                if stack.len() < 2 {
                    return None;
                }
                let n = stack.pop()?.int();
                if n < 0 {
                    return None;
                }
                let n = n as usize + 1;
                if n > stack.len() {
                    return None;
                }
                let position = stack.len() - n;
                if opcode == OP_PICK {
                    let picked = stack[position].clone();
                    stack.push(picked);
                } else {
                    let rolled = stack.remove(position);
                    stack.push(rolled);
                }
            }
            OP_ROT => {
                let x3 = stack.pop()?;
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(x2);
                stack.push(x3);
                stack.push(x1);
            }
            OP_SWAP => {
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(x2);
                stack.push(x1);
            }
            OP_TUCK => {
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(x2.clone());
                stack.push(x1);
                stack.push(x2);
            }
            OP_2DROP => {
                pop2(&mut stack)?;
            }
            OP_2DUP => {
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(x1.clone());
                stack.push(x2.clone());
                stack.push(x1);
                stack.push(x2);
            }
            OP_3DUP => {
                let x3 = stack.pop()?;
                let (x1, x2) = pop2(&mut stack)?;
                for item in [&x1, &x2, &x3, &x1, &x2, &x3] {
                    stack.push(item.clone());
                }
            }
            OP_2OVER => {
                let (x3, x4) = pop2(&mut stack)?;
                let (x1, x2) = pop2(&mut stack)?;
                for item in [&x1, &x2, &x3, &x4, &x1, &x2] {
                    stack.push(item.clone());
                }
            }
            OP_2ROT => {
                let (x5, x6) = pop2(&mut stack)?;
                let (x3, x4) = pop2(&mut stack)?;
                let (x1, x2) = pop2(&mut stack)?;
                for item in [x3, x4, x5, x6, x1, x2] {
                    stack.push(item);
                }
            }
            OP_2SWAP => {
                let (x3, x4) = pop2(&mut stack)?;
                let (x1, x2) = pop2(&mut stack)?;
                for item in [x3, x4, x1, x2] {
                    stack.push(item);
                }
            }

            // Splice
            OP_SIZE => {
                let size = stack.last()?.len() as i64;
                stack.push(ByteVector::from_int(size));
            }

            // Bitwise logic
            OP_EQUAL => {
                let (x1, x2) = pop2(&mut stack)?;
                stack.push(ByteVector::from_bool(x1 == x2));
            }

            // Arithmetic. Operands longer than four bytes abort.
            OP_1ADD => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_int(a.checked_add(1)?));
            }
            OP_1SUB => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_int(a.checked_sub(1)?));
            }
            OP_NEGATE => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_int(-a));
            }
            OP_ABS => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_int(a.abs()));
            }
            OP_NOT => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_bool(a == 0));
            }
            OP_0NOTEQUAL => {
                let a = pop_num(&mut stack)?;
                stack.push(ByteVector::from_bool(a != 0));
            }
            OP_ADD => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_int(a.checked_add(b)?));
            }
            OP_SUB => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_int(a.checked_sub(b)?));
            }
            OP_BOOLAND => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a != 0 && b != 0));
            }
            OP_BOOLOR => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a != 0 || b != 0));
            }
            OP_NUMEQUAL => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a == b));
            }
            OP_NUMNOTEQUAL => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a != b));
            }
            OP_LESSTHAN => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a < b));
            }
            OP_GREATERTHAN => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a > b));
            }
            OP_LESSTHANOREQUAL => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a <= b));
            }
            OP_GREATERTHANOREQUAL => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_bool(a >= b));
            }
            OP_MIN => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_int(a.min(b)));
            }
            OP_MAX => {
                let (a, b) = pop_num2(&mut stack)?;
                stack.push(ByteVector::from_int(a.max(b)));
            }
            OP_WITHIN => {
                let max = pop_num(&mut stack)?;
                let min = pop_num(&mut stack)?;
                let x = pop_num(&mut stack)?;
                stack.push(ByteVector::from_bool(min <= x && x < max));
            }

            // Crypto
            OP_RIPEMD160 => hash_op(&mut stack, |data| {
                use ripemd::{Digest, Ripemd160};
                Ripemd160::digest(data).to_vec()
            })?,
            OP_SHA1 => hash_op(&mut stack, |data| {
                use sha1::{Digest, Sha1};
                Sha1::digest(data).to_vec()
            })?,
            OP_SHA256 => hash_op(&mut stack, |data| {
                use sha2::{Digest, Sha256};
                Sha256::digest(data).to_vec()
            })?,
            OP_HASH160 => hash_op(&mut stack, |data| templates::hash160(data).to_vec())?,
            OP_HASH256 => hash_op(&mut stack, |data| {
                magpie_chain::serialization::sha256d::hash(data).to_vec()
            })?,

            OP_CODESEPARATOR => {
                if pc > last_codeseparator {
                    last_codeseparator = pc;
                }
            }

            OP_CHECKSIG => {
                let public_key = stack.pop()?;
                let signature = stack.pop()?;

                // The subscript drops executed code separators and any
                // push of the signature itself.
                let subscript = tokens.subscript(last_codeseparator, |token| {
                    !is_codeseparator(token) && !pushes_data(token, signature.bytes())
                });

                let valid = check_signature(
                    signature.bytes(),
                    public_key.bytes(),
                    &subscript,
                    transaction,
                    input_index,
                );
                stack.push(ByteVector::from_bool(valid));
            }

            OP_CHECKMULTISIG => {
                let key_count = stack.pop()?.int();
                if key_count < 0 || key_count as usize > stack.len() {
                    return None;
                }
                let mut public_keys: Vec<ByteVector> = Vec::new();
                for _ in 0..key_count {
                    public_keys.push(stack.pop()?);
                }

                let signature_count = stack.pop()?.int();
                if signature_count < 0 || signature_count as usize > stack.len() {
                    return None;
                }
                let mut signatures: Vec<ByteVector> = Vec::new();
                for _ in 0..signature_count {
                    signatures.push(stack.pop()?);
                }

                // A bug in the original client pops one extra element;
                // preserving it is consensus-critical.
                stack.pop()?;

                let subscript = tokens.subscript(last_codeseparator, |token| {
                    !is_codeseparator(token)
                        && !signatures.iter().any(|s| pushes_data(token, s.bytes()))
                });

                // Match signatures against the keys in order; each match
                // consumes its key.
                let mut all_matched = true;
                for signature in &signatures {
                    let matched = public_keys.iter().position(|public_key| {
                        check_signature(
                            signature.bytes(),
                            public_key.bytes(),
                            &subscript,
                            transaction,
                            input_index,
                        )
                    });
                    match matched {
                        Some(position) => {
                            public_keys.remove(position);
                        }
                        None => {
                            all_matched = false;
                            break;
                        }
                    }
                }
                stack.push(ByteVector::from_bool(all_matched));
            }

            OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => return None,

            op if (OP_NOP1..=OP_NOP10).contains(&op) => {}

            // Disabled opcodes and anything unmapped fail the script.
            op => {
                trace!(opcode = op, name = name(op), "rejected opcode");
                return None;
            }
        }
    }

    Some(stack.last().map(ByteVector::is_true).unwrap_or(false))
}

fn pop2(stack: &mut Vec<ByteVector>) -> Option<(ByteVector, ByteVector)> {
    let x2 = stack.pop()?;
    let x1 = stack.pop()?;
    Some((x1, x2))
}

/// Pop an arithmetic operand, rejecting vectors longer than four bytes.
fn pop_num(stack: &mut Vec<ByteVector>) -> Option<i64> {
    let value = stack.pop()?;
    if value.len() > 4 {
        return None;
    }
    Some(value.int())
}

fn pop_num2(stack: &mut Vec<ByteVector>) -> Option<(i64, i64)> {
    let b = pop_num(stack)?;
    let a = pop_num(stack)?;
    Some((a, b))
}

fn hash_op<F>(stack: &mut Vec<ByteVector>, hash: F) -> Option<()>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    let top = stack.pop()?;
    stack.push(ByteVector::new(hash(top.bytes())));
    Some(())
}

fn is_codeseparator(token: &Token) -> bool {
    token.opcode == OP_CODESEPARATOR
}

fn pushes_data(token: &Token, data: &[u8]) -> bool {
    token.opcode == OP_LITERAL
        && token
            .value
            .as_ref()
            .map(|value| value.bytes() == data)
            .unwrap_or(false)
}

/// ECDSA-check one signature (with its trailing hash-type byte) against a
/// public key, under `subscript`.
fn check_signature(
    signature_and_type: &[u8],
    public_key: &[u8],
    subscript: &[u8],
    transaction: &Transaction,
    input_index: usize,
) -> bool {
    let (signature, hash_type) = match signature_and_type.split_last() {
        Some((hash_type, signature)) => (signature, *hash_type),
        None => return false,
    };

    let digest = match signature_hash(transaction, input_index, subscript, hash_type) {
        Some(digest) => digest,
        None => return false,
    };

    let public_key = match PublicKey::from_slice(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };
    // Historical chain signatures predate strict DER enforcement.
    let mut signature = match ecdsa::Signature::from_der_lax(signature) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    signature.normalize_s();

    let message = match Message::from_slice(&digest) {
        Ok(message) => message,
        Err(_) => return false,
    };
    SECP.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_chain::WireDeserialize;

    fn dummy_tx() -> Transaction {
        use magpie_chain::transparent::{coinbase_input, Output};
        Transaction::new(
            1,
            vec![coinbase_input(vec![0x51])],
            vec![Output {
                value: magpie_chain::Amount::from_sat(50),
                pk_script: Script(vec![]),
            }],
            0,
        )
    }

    fn eval(sig: &[u8], pk: &[u8]) -> bool {
        evaluate(sig, pk, &dummy_tx(), 0)
    }

    #[test]
    fn empty_scripts_fail() {
        assert!(!eval(&[], &[]));
    }

    #[test]
    fn arithmetic_and_comparison() {
        // 2 3 ADD 5 NUMEQUAL
        assert!(eval(&[0x52, 0x53], &[0x93, 0x55, 0x9c]));
        // 2 3 SUB → -1 → truthy
        assert!(eval(&[0x52, 0x53], &[0x94]));
        // 7 3 SUB 4 NUMEQUAL
        assert!(eval(&[0x57, 0x53], &[0x94, 0x54, 0x9c]));
        // 1 2 MIN 1 NUMEQUAL
        assert!(eval(&[0x51, 0x52], &[0xa3, 0x51, 0x9c]));
        // 5 within [1, 10)
        assert!(eval(&[0x55], &[0x51, 0x5a, 0xa5]));
        // 10 not within [1, 10)
        assert!(!eval(&[0x5a], &[0x51, 0x5a, 0xa5]));
    }

    #[test]
    fn four_byte_operand_limit() {
        // A five-byte literal cannot be an arithmetic operand...
        let sig = [0x05, 1, 0, 0, 0, 0, 0x51];
        assert!(!eval(&sig, &[0x93]));
        // ...but a four-byte one can.
        let sig = [0x04, 1, 0, 0, 0, 0x51];
        assert!(eval(&sig, &[0x93]));
    }

    #[test]
    fn equal_has_no_size_limit() {
        let mut sig = vec![0x05, 1, 2, 3, 4, 5];
        sig.extend_from_slice(&[0x05, 1, 2, 3, 4, 5]);
        assert!(eval(&sig, &[0x87]));
    }

    #[test]
    fn branches() {
        // 1 IF 2 ELSE 3 ENDIF 2 NUMEQUAL
        assert!(eval(&[0x51], &[0x63, 0x52, 0x67, 0x53, 0x68, 0x52, 0x9c]));
        // 0 IF 2 ELSE 3 ENDIF 3 NUMEQUAL
        assert!(eval(&[0x00], &[0x63, 0x52, 0x67, 0x53, 0x68, 0x53, 0x9c]));
        // 0 NOTIF 1 ENDIF
        assert!(eval(&[0x00], &[0x64, 0x51, 0x68]));
        // ELSE without IF fails
        assert!(!eval(&[0x51], &[0x67]));
        // Unclosed IF leaves a dangling condition but no failure; the
        // stack decides. (Matches the reference interpreter.)
        assert!(eval(&[0x51], &[0x63, 0x51]));
    }

    #[test]
    fn verify_semantics() {
        // 1 VERIFY leaves an empty stack → final check fails
        assert!(!eval(&[0x51], &[0x69]));
        // 1 VERIFY 1 succeeds
        assert!(eval(&[0x51], &[0x69, 0x51]));
        // 0 VERIFY aborts
        assert!(!eval(&[0x00], &[0x69, 0x51]));
        // EQUALVERIFY expands and verifies
        assert!(eval(&[0x52, 0x52], &[0x88, 0x51]));
        assert!(!eval(&[0x52, 0x53], &[0x88, 0x51]));
    }

    #[test]
    fn op_return_fails() {
        assert!(!eval(&[0x51], &[0x6a]));
    }

    #[test]
    fn disabled_opcodes_fail_even_with_valid_stack() {
        for opcode in crate::opcodes::DISABLED {
            let script = [0x51, 0x51, *opcode as u8];
            assert!(!eval(&[], &script), "opcode {:#x} must fail", opcode);
        }
    }

    #[test]
    fn verif_fails_even_in_skipped_branch() {
        // 0 IF VERIF ENDIF 1: VERIF poisons the whole script.
        assert!(!eval(&[0x00], &[0x63, 0x65, 0x68, 0x51]));
        // Reserved opcode in a skipped branch is fine.
        assert!(eval(&[0x00], &[0x63, 0x50, 0x68, 0x51]));
        // Reserved opcode executed fails.
        assert!(!eval(&[0x51], &[0x63, 0x50, 0x68, 0x51]));
    }

    #[test]
    fn nops_are_silent() {
        assert!(eval(&[0x51], &[0x61, 0xb0, 0xb9]));
    }

    #[test]
    fn unknown_opcode_fails() {
        assert!(!eval(&[0x51], &[0xba]));
        assert!(!eval(&[0x51], &[0xff]));
    }

    #[test]
    fn stack_ops() {
        // 1 2 SWAP → top is 1... then NUMEQUAL(2,1) false; use DROP tests
        // DEPTH: 1 1 DEPTH 2 NUMEQUAL
        assert!(eval(&[0x51, 0x51], &[0x74, 0x52, 0x9c]));
        // 1 2 DROP → 1
        assert!(eval(&[0x51, 0x52], &[0x75]));
        // DUP on empty fails
        assert!(!eval(&[], &[0x76]));
        // 1 TOALTSTACK FROMALTSTACK
        assert!(eval(&[0x51], &[0x6b, 0x6c]));
        // 5 1 1 2 PICK 5 NUMEQUAL (PICK copies the item 3 deep)
        assert!(eval(&[0x55, 0x51, 0x51], &[0x52, 0x79, 0x55, 0x9c]));
        // 5 1 1 2 ROLL 5 NUMEQUAL (ROLL moves it)
        assert!(eval(&[0x55, 0x51, 0x51], &[0x52, 0x7a, 0x55, 0x9c]));
        // SIZE: push 0xaabb, SIZE → 2
        assert!(eval(&[0x02, 0xaa, 0xbb], &[0x82, 0x52, 0x9c]));
    }

    #[test]
    fn multisig_dummy_element() {
        // 0-of-1 multisig: the dummy is consumed, the check vacuously
        // succeeds.
        let mut pk_script = vec![0x00, 0x21];
        pk_script.extend_from_slice(&[0x02; 33]); // placeholder key
        pk_script.extend_from_slice(&[0x51, 0xae]);
        // scriptSig pushes only the dummy.
        assert!(eval(&[0x00], &pk_script));

        // Without the dummy the stack underflows and the script fails.
        let mut pk_script = vec![0x21];
        pk_script.extend_from_slice(&[0x02; 33]);
        pk_script.extend_from_slice(&[0x51, 0xae]);
        assert!(!eval(&[0x00], &pk_script));
    }

    #[test]
    fn multisig_rejects_unmatchable_signature() {
        // 1-of-1 with a garbage signature: the signature matches no key,
        // so CHECKMULTISIG pushes 0 and the script is false.
        let mut pk_script = vec![0x21];
        pk_script.extend_from_slice(&[0x02; 33]);
        pk_script.extend_from_slice(&[0x51, 0xae]);
        // dummy + one garbage "signature" + m=1
        let sig_script = [0x00, 0x03, 1, 2, 3, 0x51];
        assert!(!eval(&sig_script, &pk_script));
    }

    /// The first ever peer-to-peer spend: Bitcoin block 170, transaction
    /// f4184fc5…9e16, spending the block 9 coinbase with a pay-to-pubkey
    /// script. Exercises the full CHECKSIG and sighash pipeline against
    /// chain data.
    #[test]
    fn block_170_spend_verifies() {
        let raw_tx = hex::decode(
            "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000\
             004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd4102\
             20181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200\
             ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa2\
             8414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee00\
             00000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0\
             eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000",
        )
        .unwrap();
        let tx = Transaction::wire_deserialize(&raw_tx[..]).unwrap();

        // The block 9 coinbase output's pay-to-pubkey script.
        let pk_script = Script(
            hex::decode(
                "410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb\
                 84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac",
            )
            .unwrap(),
        );

        assert!(verify_input(&tx, 0, &pk_script));

        // Any single bit flip in the pubkey hash position breaks it.
        let mut bad_pk = pk_script.clone();
        bad_pk.0[10] ^= 0x01;
        assert!(!verify_input(&tx, 0, &bad_pk));

        // A bit flip in the signature breaks it too.
        let mut bad_tx_raw = raw_tx.clone();
        // The DER signature begins at offset 42 into the transaction.
        bad_tx_raw[50] ^= 0x01;
        let bad_tx = Transaction::wire_deserialize(&bad_tx_raw[..]).unwrap();
        assert!(!verify_input(&bad_tx, 0, &pk_script));
    }

    #[test]
    fn determinism() {
        let tx = dummy_tx();
        let sig = [0x52, 0x53];
        let pk = [0x93, 0x55, 0x9c];
        let first = evaluate(&sig, &pk, &tx, 0);
        for _ in 0..10 {
            assert_eq!(evaluate(&sig, &pk, &tx, 0), first);
        }
    }
}
