//! Script opcode constants.
//!
//! Opcodes are `u16` so the tokenizer can use a value above the byte range
//! ([`OP_LITERAL`]) to tag pushed data.

// Push value
pub const OP_0: u16 = 0x00;
pub const OP_PUSHDATA1: u16 = 0x4c;
pub const OP_PUSHDATA2: u16 = 0x4d;
pub const OP_PUSHDATA4: u16 = 0x4e;
pub const OP_1NEGATE: u16 = 0x4f;
pub const OP_1: u16 = 0x51;
pub const OP_16: u16 = 0x60;

// Flow control
pub const OP_NOP: u16 = 0x61;
pub const OP_IF: u16 = 0x63;
pub const OP_NOTIF: u16 = 0x64;
pub const OP_ELSE: u16 = 0x67;
pub const OP_ENDIF: u16 = 0x68;
pub const OP_VERIFY: u16 = 0x69;
pub const OP_RETURN: u16 = 0x6a;

// Stack
pub const OP_TOALTSTACK: u16 = 0x6b;
pub const OP_FROMALTSTACK: u16 = 0x6c;
pub const OP_2DROP: u16 = 0x6d;
pub const OP_2DUP: u16 = 0x6e;
pub const OP_3DUP: u16 = 0x6f;
pub const OP_2OVER: u16 = 0x70;
pub const OP_2ROT: u16 = 0x71;
pub const OP_2SWAP: u16 = 0x72;
pub const OP_IFDUP: u16 = 0x73;
pub const OP_DEPTH: u16 = 0x74;
pub const OP_DROP: u16 = 0x75;
pub const OP_DUP: u16 = 0x76;
pub const OP_NIP: u16 = 0x77;
pub const OP_OVER: u16 = 0x78;
pub const OP_PICK: u16 = 0x79;
pub const OP_ROLL: u16 = 0x7a;
pub const OP_ROT: u16 = 0x7b;
pub const OP_SWAP: u16 = 0x7c;
pub const OP_TUCK: u16 = 0x7d;

// Splice (all but OP_SIZE are disabled)
pub const OP_CAT: u16 = 0x7e;
pub const OP_SUBSTR: u16 = 0x7f;
pub const OP_LEFT: u16 = 0x80;
pub const OP_RIGHT: u16 = 0x81;
pub const OP_SIZE: u16 = 0x82;

// Bitwise logic (all but the equality tests are disabled)
pub const OP_INVERT: u16 = 0x83;
pub const OP_AND: u16 = 0x84;
pub const OP_OR: u16 = 0x85;
pub const OP_XOR: u16 = 0x86;
pub const OP_EQUAL: u16 = 0x87;
pub const OP_EQUALVERIFY: u16 = 0x88;

// Arithmetic
pub const OP_1ADD: u16 = 0x8b;
pub const OP_1SUB: u16 = 0x8c;
pub const OP_2MUL: u16 = 0x8d;
pub const OP_2DIV: u16 = 0x8e;
pub const OP_NEGATE: u16 = 0x8f;
pub const OP_ABS: u16 = 0x90;
pub const OP_NOT: u16 = 0x91;
pub const OP_0NOTEQUAL: u16 = 0x92;
pub const OP_ADD: u16 = 0x93;
pub const OP_SUB: u16 = 0x94;
pub const OP_MUL: u16 = 0x95;
pub const OP_DIV: u16 = 0x96;
pub const OP_MOD: u16 = 0x97;
pub const OP_LSHIFT: u16 = 0x98;
pub const OP_RSHIFT: u16 = 0x99;
pub const OP_BOOLAND: u16 = 0x9a;
pub const OP_BOOLOR: u16 = 0x9b;
pub const OP_NUMEQUAL: u16 = 0x9c;
pub const OP_NUMEQUALVERIFY: u16 = 0x9d;
pub const OP_NUMNOTEQUAL: u16 = 0x9e;
pub const OP_LESSTHAN: u16 = 0x9f;
pub const OP_GREATERTHAN: u16 = 0xa0;
pub const OP_LESSTHANOREQUAL: u16 = 0xa1;
pub const OP_GREATERTHANOREQUAL: u16 = 0xa2;
pub const OP_MIN: u16 = 0xa3;
pub const OP_MAX: u16 = 0xa4;
pub const OP_WITHIN: u16 = 0xa5;

// Crypto
pub const OP_RIPEMD160: u16 = 0xa6;
pub const OP_SHA1: u16 = 0xa7;
pub const OP_SHA256: u16 = 0xa8;
pub const OP_HASH160: u16 = 0xa9;
pub const OP_HASH256: u16 = 0xaa;
pub const OP_CODESEPARATOR: u16 = 0xab;
pub const OP_CHECKSIG: u16 = 0xac;
pub const OP_CHECKSIGVERIFY: u16 = 0xad;
pub const OP_CHECKMULTISIG: u16 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u16 = 0xaf;

// Expansion
pub const OP_NOP1: u16 = 0xb0;
pub const OP_NOP10: u16 = 0xb9;

// Reserved words. VERIF and VERNOTIF invalidate the script even inside an
// unexecuted branch; the others only when executed.
pub const OP_RESERVED: u16 = 0x50;
pub const OP_VER: u16 = 0x62;
pub const OP_VERIF: u16 = 0x65;
pub const OP_VERNOTIF: u16 = 0x66;
pub const OP_RESERVED1: u16 = 0x89;
pub const OP_RESERVED2: u16 = 0x8a;

/// Pseudo-opcode the tokenizer assigns to pushed data.
pub const OP_LITERAL: u16 = 0x1ff;

/// Opcodes that unconditionally fail the script when executed.
pub const DISABLED: &[u16] = &[
    OP_CAT, OP_SUBSTR, OP_LEFT, OP_RIGHT, OP_INVERT, OP_AND, OP_OR, OP_XOR, OP_2MUL, OP_2DIV,
    OP_MUL, OP_DIV, OP_MOD, OP_LSHIFT, OP_RSHIFT,
];

/// A debugging name for an opcode.
pub fn name(opcode: u16) -> &'static str {
    match opcode {
        OP_0 => "OP_0",
        OP_PUSHDATA1 => "OP_PUSHDATA1",
        OP_PUSHDATA2 => "OP_PUSHDATA2",
        OP_PUSHDATA4 => "OP_PUSHDATA4",
        OP_1NEGATE => "OP_1NEGATE",
        OP_NOP => "OP_NOP",
        OP_IF => "OP_IF",
        OP_NOTIF => "OP_NOTIF",
        OP_ELSE => "OP_ELSE",
        OP_ENDIF => "OP_ENDIF",
        OP_VERIFY => "OP_VERIFY",
        OP_RETURN => "OP_RETURN",
        OP_DUP => "OP_DUP",
        OP_EQUAL => "OP_EQUAL",
        OP_EQUALVERIFY => "OP_EQUALVERIFY",
        OP_RIPEMD160 => "OP_RIPEMD160",
        OP_SHA1 => "OP_SHA1",
        OP_SHA256 => "OP_SHA256",
        OP_HASH160 => "OP_HASH160",
        OP_HASH256 => "OP_HASH256",
        OP_CODESEPARATOR => "OP_CODESEPARATOR",
        OP_CHECKSIG => "OP_CHECKSIG",
        OP_CHECKSIGVERIFY => "OP_CHECKSIGVERIFY",
        OP_CHECKMULTISIG => "OP_CHECKMULTISIG",
        OP_CHECKMULTISIGVERIFY => "OP_CHECKMULTISIGVERIFY",
        OP_LITERAL => "(literal)",
        _ => "(unnamed)",
    }
}
