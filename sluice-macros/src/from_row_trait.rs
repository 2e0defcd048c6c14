use crate::decode_field::FieldMetadata;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Index, ItemStruct};

pub(crate) fn from_row_trait(item: &ItemStruct, fields: &[FieldMetadata]) -> TokenStream {
    let struct_name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let read = fields.iter().filter(|f| !f.skip);
    let readers = read.clone().map(|f| {
        let ty = &f.ty;
        let column = f.column();
        quote!(::sluice::column::<#ty>(#column))
    });
    let assignments = read.enumerate().map(|(i, f)| {
        let ident = &f.ident;
        let index = Index::from(i);
        quote!(#ident: __readers__.#index.read(row, context)?)
    });
    let defaults = fields.iter().filter(|f| f.skip).map(|f| {
        let ident = &f.ident;
        quote!(#ident: ::std::default::Default::default())
    });
    quote! {
        impl #impl_generics ::sluice::FromRow for #struct_name #ty_generics #where_clause {
            fn row_reader() -> ::sluice::RowReader<Self> {
                let __readers__ = (#(#readers,)*);
                ::sluice::RowReader::new(move |row, context| {
                    let _ = (row, context);
                    ::std::result::Result::Ok(Self {
                        #(#assignments,)*
                        #(#defaults,)*
                    })
                })
            }
        }
    }
}
