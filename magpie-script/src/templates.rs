//! Standard script form detection.
//!
//! Used by the UTXO engine to derive address hints for new outputs, and by
//! anything that wants to classify an output script.

use magpie_chain::transparent::Script;

use crate::opcodes::*;
use crate::tokenizer::{Token, Tokenizer};

/// The recognized standard output script forms.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScriptForm {
    PayToPubkeyHash,
    PayToPubkey,
    NonStandard,
}

/// RIPEMD-160 of SHA-256: the Bitcoin address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    use ripemd::Ripemd160;
    use sha2::{Digest, Sha256};
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

fn is_hash160_literal(token: &Token) -> bool {
    token.opcode == OP_LITERAL
        && token.value.as_ref().map(|v| v.len()) == Some(20)
}

fn is_pubkey_literal(token: &Token) -> bool {
    // Only uncompressed keys appear in the era this node replays.
    token.opcode == OP_LITERAL
        && token
            .value
            .as_ref()
            .map(|v| v.len() == 65 && v.bytes()[0] == 0x04)
            .unwrap_or(false)
}

/// Classify an output script.
pub fn script_form(pk_script: &Script) -> ScriptForm {
    let tokens = match Tokenizer::new(pk_script.as_bytes(), false) {
        Ok(tokens) => tokens,
        Err(()) => return ScriptForm::NonStandard,
    };

    if tokens.len() == 5
        && tokens.get(0).opcode == OP_DUP
        && tokens.get(1).opcode == OP_HASH160
        && is_hash160_literal(tokens.get(2))
        && tokens.get(3).opcode == OP_EQUALVERIFY
        && tokens.get(4).opcode == OP_CHECKSIG
    {
        return ScriptForm::PayToPubkeyHash;
    }

    if tokens.len() == 2
        && is_pubkey_literal(tokens.get(0))
        && tokens.get(1).opcode == OP_CHECKSIG
    {
        return ScriptForm::PayToPubkey;
    }

    ScriptForm::NonStandard
}

/// The 20-byte pubkey hash an output pays to, for standard forms.
///
/// Non-standard outputs have no address; their UTXO rows carry a zero
/// hint.
pub fn output_pubkey_hash(pk_script: &Script) -> Option<[u8; 20]> {
    let tokens = Tokenizer::new(pk_script.as_bytes(), false).ok()?;

    match script_form(pk_script) {
        ScriptForm::PayToPubkeyHash => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(tokens.get(2).value.as_ref()?.bytes());
            Some(hash)
        }
        ScriptForm::PayToPubkey => {
            let pubkey = tokens.get(0).value.as_ref()?;
            Some(hash160(pubkey.bytes()))
        }
        ScriptForm::NonStandard => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh(hash: [u8; 20]) -> Script {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&hash);
        script.extend_from_slice(&[0x88, 0xac]);
        Script(script)
    }

    #[test]
    fn classifies_p2pkh() {
        let script = p2pkh([0x11; 20]);
        assert_eq!(script_form(&script), ScriptForm::PayToPubkeyHash);
        assert_eq!(output_pubkey_hash(&script), Some([0x11; 20]));
    }

    #[test]
    fn classifies_p2pk() {
        let mut raw = vec![0x41];
        let mut key = vec![0x04];
        key.extend_from_slice(&[0x22; 64]);
        raw.extend_from_slice(&key);
        raw.push(0xac);
        let script = Script(raw);
        assert_eq!(script_form(&script), ScriptForm::PayToPubkey);
        assert_eq!(output_pubkey_hash(&script), Some(hash160(&key)));
    }

    #[test]
    fn nonstandard_scripts_have_no_address() {
        assert_eq!(script_form(&Script(vec![0x6a])), ScriptForm::NonStandard);
        assert_eq!(output_pubkey_hash(&Script(vec![0x6a])), None);
        // A 19-byte "hash" is not a P2PKH.
        let mut script = vec![0x76, 0xa9, 0x13];
        script.extend_from_slice(&[0x11; 19]);
        script.extend_from_slice(&[0x88, 0xac]);
        assert_eq!(script_form(&Script(script)), ScriptForm::NonStandard);
    }

    #[test]
    fn hash160_vector() {
        // hash160 of empty input.
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }
}
