//! Script tokenization.

use crate::num::ByteVector;
use crate::opcodes::*;

/// One parsed script token: the opcode, the raw bytes it occupied in the
/// script (needed to rebuild subscripts), and the pushed value for
/// literals.
#[derive(Clone, Debug)]
pub struct Token {
    /// The opcode, or [`OP_LITERAL`] for pushed data.
    pub opcode: u16,
    /// The raw bytes of this token as they appeared in the script,
    /// including any length prefix. Empty for synthesized tokens.
    pub raw: Vec<u8>,
    /// The pushed value, for literals only.
    pub value: Option<ByteVector>,
}

/// Tokenizes a script into a flat token list.
///
/// Literals get the pseudo-opcode [`OP_LITERAL`]; `OP_0`, `OP_1NEGATE` and
/// `OP_1..OP_16` are converted to literal pushes of their value. When
/// `expand_verify` is set, the `*VERIFY` opcodes are expanded into their
/// plain form followed by a synthesized `OP_VERIFY` (with no raw bytes, so
/// subscript rebuilding still sees the original opcode).
pub struct Tokenizer {
    tokens: Vec<Token>,
    expand_verify: bool,
}

fn expanded(opcode: u16) -> Option<u16> {
    match opcode {
        OP_EQUALVERIFY => Some(OP_EQUAL),
        OP_NUMEQUALVERIFY => Some(OP_NUMEQUAL),
        OP_CHECKSIGVERIFY => Some(OP_CHECKSIG),
        OP_CHECKMULTISIGVERIFY => Some(OP_CHECKMULTISIG),
        _ => None,
    }
}

impl Tokenizer {
    /// Tokenize `script`; fails on a truncated data push.
    pub fn new(script: &[u8], expand_verify: bool) -> Result<Tokenizer, ()> {
        let mut tokenizer = Tokenizer {
            tokens: Vec::new(),
            expand_verify,
        };
        tokenizer.append(script)?;
        Ok(tokenizer)
    }

    /// Tokenize more script onto the end of the token list.
    pub fn append(&mut self, script: &[u8]) -> Result<(), ()> {
        let mut cursor = 0usize;

        while cursor < script.len() {
            let first = script[cursor];
            let mut opcode = first as u16;
            let mut raw = vec![first];
            let mut value = None;
            let mut verify = false;
            cursor += 1;

            if opcode == OP_0 {
                value = Some(ByteVector::empty());
                opcode = OP_LITERAL;
            } else if (0x01..=0x4e).contains(&opcode) {
                // An inline push: 0x01..0x4b push that many bytes;
                // PUSHDATA1/2/4 carry an explicit little-endian length.
                let mut length = opcode as usize;
                if (OP_PUSHDATA1..=OP_PUSHDATA4).contains(&opcode) {
                    let prefix_len = 1usize << (opcode - OP_PUSHDATA1);
                    let prefix = script.get(cursor..cursor + prefix_len).ok_or(())?;
                    length = prefix
                        .iter()
                        .rev()
                        .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
                    raw.extend_from_slice(prefix);
                    cursor += prefix_len;
                }

                let data = script.get(cursor..cursor + length).ok_or(())?;
                raw.extend_from_slice(data);
                value = Some(ByteVector::new(data.to_vec()));
                cursor += length;
                opcode = OP_LITERAL;
            } else if opcode == OP_1NEGATE {
                value = Some(ByteVector::from_int(-1));
                opcode = OP_LITERAL;
            } else if (OP_1..=OP_16).contains(&opcode) {
                value = Some(ByteVector::from_int((opcode - OP_1 + 1) as i64));
                opcode = OP_LITERAL;
            } else if self.expand_verify {
                if let Some(plain) = expanded(opcode) {
                    opcode = plain;
                    verify = true;
                }
            }

            self.tokens.push(Token { opcode, raw, value });

            if verify {
                self.tokens.push(Token {
                    opcode: OP_VERIFY,
                    raw: Vec::new(),
                    value: None,
                });
            }
        }

        Ok(())
    }

    /// Rebuild the raw script from token `start` onward, dropping tokens
    /// rejected by `keep`.
    pub fn subscript<F>(&self, start: usize, keep: F) -> Vec<u8>
    where
        F: Fn(&Token) -> bool,
    {
        let mut output = Vec::new();
        for token in &self.tokens[start..] {
            if keep(token) {
                output.extend_from_slice(&token.raw);
            }
        }
        output
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> &Token {
        &self.tokens[index]
    }

    pub fn opcodes(&self) -> impl Iterator<Item = u16> + '_ {
        self.tokens.iter().map(|t| t.opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_and_opcodes() {
        // OP_1 OP_DUP <0xaabb> OP_EQUAL
        let script = [0x51, 0x76, 0x02, 0xaa, 0xbb, 0x87];
        let tokens = Tokenizer::new(&script, false).unwrap();
        assert_eq!(
            tokens.opcodes().collect::<Vec<_>>(),
            vec![OP_LITERAL, OP_DUP, OP_LITERAL, OP_EQUAL]
        );
        assert_eq!(tokens.get(0).value.as_ref().unwrap().int(), 1);
        assert_eq!(tokens.get(2).value.as_ref().unwrap().bytes(), &[0xaa, 0xbb]);
        // The raw bytes keep the push prefix.
        assert_eq!(tokens.get(2).raw, vec![0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn pushdata_forms() {
        let mut script = vec![0x4c, 0x03, 1, 2, 3]; // PUSHDATA1
        script.extend_from_slice(&[0x4d, 0x02, 0x00, 9, 8]); // PUSHDATA2
        script.extend_from_slice(&[0x4e, 0x01, 0x00, 0x00, 0x00, 7]); // PUSHDATA4
        let tokens = Tokenizer::new(&script, false).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens.get(0).value.as_ref().unwrap().bytes(), &[1, 2, 3]);
        assert_eq!(tokens.get(1).value.as_ref().unwrap().bytes(), &[9, 8]);
        assert_eq!(tokens.get(2).value.as_ref().unwrap().bytes(), &[7]);
    }

    #[test]
    fn truncated_push_fails() {
        assert!(Tokenizer::new(&[0x05, 1, 2], false).is_err());
        assert!(Tokenizer::new(&[0x4c], false).is_err());
        assert!(Tokenizer::new(&[0x4c, 0x04, 1], false).is_err());
    }

    #[test]
    fn verify_expansion_keeps_raw_bytes() {
        let script = [0x88u8]; // OP_EQUALVERIFY
        let tokens = Tokenizer::new(&script, true).unwrap();
        assert_eq!(
            tokens.opcodes().collect::<Vec<_>>(),
            vec![OP_EQUAL, OP_VERIFY]
        );
        // The synthesized OP_VERIFY contributes no bytes to subscripts.
        assert_eq!(tokens.subscript(0, |_| true), vec![0x88]);
    }

    #[test]
    fn subscript_filtering() {
        // <0x01> OP_CODESEPARATOR <0x02>
        let script = [0x01, 0x01, 0xab, 0x01, 0x02];
        let tokens = Tokenizer::new(&script, false).unwrap();
        let rebuilt = tokens.subscript(0, |t| t.opcode != OP_CODESEPARATOR);
        assert_eq!(rebuilt, vec![0x01, 0x01, 0x01, 0x02]);
    }
}
