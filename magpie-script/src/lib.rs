//! The script virtual machine: a stack-based interpreter for the
//! Bitcoin-inherited transaction script language.
//!
//! The authoritative entry point is [`verify_input`], which checks one
//! transaction input against the `pk_script` of the output it spends. The
//! machine is deterministic: its outcome depends only on the two scripts,
//! the spending transaction, and the input index.

mod interpreter;
mod num;
mod sighash;
mod templates;
mod tokenizer;

pub mod opcodes;

pub use interpreter::{evaluate, verify_input};
pub use num::ByteVector;
pub use sighash::signature_hash;
pub use templates::{hash160, output_pubkey_hash, script_form, ScriptForm};
pub use tokenizer::{Token, Tokenizer};
