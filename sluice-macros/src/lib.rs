mod deconstruct_trait;
mod decode_field;
mod from_row_trait;

use deconstruct_trait::deconstruct_trait;
use decode_field::decode_fields;
use from_row_trait::from_row_trait;
use proc_macro::TokenStream;
use syn::{ItemStruct, parse_macro_input};

/// Implements `Deconstruct`: one component per field, in declaration order.
///
/// Field attributes:
/// * `#[sluice(name = "column")]` explicit name, the name transform is not applied;
/// * `#[sluice(skip)]` the field is not a component.
///
/// Every component type must implement `AsValue` and `Clone`.
#[proc_macro_derive(Deconstruct, attributes(sluice))]
pub fn derive_deconstruct(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let fields = decode_fields(&item);
    deconstruct_trait(&item, &fields).into()
}

/// Implements `FromRow`, reading every field from the column with the same name in
/// lower snake case (or the one given by `#[sluice(name = "..")]`). Skipped fields are
/// initialized with `Default::default()`.
#[proc_macro_derive(FromRow, attributes(sluice))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let fields = decode_fields(&item);
    from_row_trait(&item, &fields).into()
}
