use crate::decode_field::FieldMetadata;
use proc_macro2::TokenStream;
use quote::quote;
use syn::ItemStruct;

pub(crate) fn deconstruct_trait(item: &ItemStruct, fields: &[FieldMetadata]) -> TokenStream {
    let struct_name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let components = fields.iter().filter(|f| !f.skip).map(|f| {
        let ident = &f.ident;
        let raw = &f.raw;
        let rename = match &f.rename {
            Some(rename) => quote!(::std::option::Option::Some(#rename)),
            None => quote!(::std::option::Option::None),
        };
        quote! {
            ::sluice::Component {
                name: #raw,
                rename: #rename,
                get: |v: &Self| ::sluice::AsValue::as_value(::std::clone::Clone::clone(&v.#ident)),
            }
        }
    });
    quote! {
        impl #impl_generics ::sluice::Deconstruct for #struct_name #ty_generics #where_clause {
            fn components() -> ::std::vec::Vec<::sluice::Component<Self>> {
                ::std::vec![#(#components),*]
            }
        }
    }
}
