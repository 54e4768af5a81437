use proc_macro::TokenStream;
use quote::quote;

pub fn expand(ast: &syn::DeriveInput) -> TokenStream {
    let name = &ast.ident;
    match ast.data {
        syn::Data::Struct(ref data) => {
            let body = match data.fields {
                syn::Fields::Named(ref fields) => {
                    let reads = fields.named.iter().map(|field| {
                        let ident = field.ident.as_ref().expect("named field has ident");
                        let ty = &field.ty;
                        quote! { #ident: <#ty>::wire_deserialize(&mut reader)?, }
                    });
                    quote! { Ok(#name { #(#reads)* }) }
                }
                syn::Fields::Unnamed(ref fields) => {
                    let reads = fields.unnamed.iter().map(|field| {
                        let ty = &field.ty;
                        quote! { <#ty>::wire_deserialize(&mut reader)?, }
                    });
                    quote! { Ok(#name ( #(#reads)* )) }
                }
                syn::Fields::Unit => quote! { Ok(#name) },
            };

            let expanded = quote! {
                impl WireDeserialize for #name {
                    fn wire_deserialize<R: std::io::Read>(
                        mut reader: R,
                    ) -> Result<Self, SerializationError> {
                        #body
                    }
                }
            };
            TokenStream::from(expanded)
        }
        _ => panic!("WireDeserialize can only be derived for structs"),
    }
}
