use proc_macro::TokenStream;
use quote::quote;

pub fn expand(ast: &syn::DeriveInput) -> TokenStream {
    let name = &ast.ident;
    match ast.data {
        syn::Data::Struct(ref data) => {
            let writes = data
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| write_field(field, index))
                .collect::<Vec<_>>();

            let expanded = quote! {
                impl WireSerialize for #name {
                    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
                    where
                        W: std::io::Write,
                    {
                        #(#writes)*
                        Ok(())
                    }
                }
            };
            TokenStream::from(expanded)
        }
        _ => panic!("WireSerialize can only be derived for structs"),
    }
}

fn write_field(field: &syn::Field, index: usize) -> proc_macro2::TokenStream {
    match field.ident {
        Some(ref ident) => quote! { self.#ident.wire_serialize(&mut target)?; },
        None => {
            let index = syn::Index::from(index);
            quote! { self.#index.wire_serialize(&mut target)?; }
        }
    }
}
