use proc_macro::TokenStream;
use quote::quote;
use syn;

pub fn impl_deser_macro(ast: &syn::DeriveInput) -> TokenStream {
    let name = ast.ident.clone();
    let is_tuple_struct = match ast.data {
        syn::Data::Struct(ref data) => match data.fields {
            syn::Fields::Unnamed(_) => true,
            _ => false,
        },
        _ => false,
    };
    let statements: Vec<quote::__private::TokenStream> = match ast.data {
        syn::Data::Struct(ref data) => data
            .fields
            .iter()
            .zip(0..1_000_000)
            .map(|(field, index)| deserialize_field(field, index))
            .collect(),
        // See serialize.rs: enum encodings are hand-written.
        _ => unimplemented!(),
    };
    let expanded = if is_tuple_struct {
        quote! {
            impl HandshakeDeserialize for #name {
                fn handshake_deserialize<R: std::io::Read>(mut target: R) -> Result<Self, SerializationError>
                {
                    Ok(#name (
                        #(#statements)*
                    ))
                }
            }
        }
    } else {
        quote! {
            impl HandshakeDeserialize for #name {
                fn handshake_deserialize<R: std::io::Read>(mut target: R) -> Result<Self, SerializationError>
                {
                    Ok(#name {
                        #(#statements)*
                    })
                }
            }
        }
    };

    TokenStream::from(expanded)
}

fn deserialize_field(field: &syn::Field, _index: usize) -> quote::__private::TokenStream {
    let ty = field.ty.clone();
    match field.ident.clone() {
        Some(name) => {
            quote! { #name: <#ty as HandshakeDeserialize>::handshake_deserialize(&mut target)?, }
        }
        None => {
            quote! { <#ty>::handshake_deserialize(&mut target)?, }
        }
    }
}
