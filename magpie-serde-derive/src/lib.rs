//! Derive macros for the magpie wire-format traits.
//!
//! `#[derive(WireSerialize)]` writes each field in declaration order;
//! `#[derive(WireDeserialize)]` reads them back in the same order. Types
//! whose wire form differs from their field order (cached hashes, optional
//! trailing fields) implement the traits by hand instead.

extern crate proc_macro;
use proc_macro::TokenStream;

mod deserialize;
mod serialize;

#[proc_macro_derive(WireSerialize)]
pub fn wire_serialize(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).expect("WireSerialize target must be a well-formed item");
    serialize::expand(&ast)
}

#[proc_macro_derive(WireDeserialize)]
pub fn wire_deserialize(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).expect("WireDeserialize target must be a well-formed item");
    deserialize::expand(&ast)
}
