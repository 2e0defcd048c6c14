use quote::ToTokens;
use sluice_core::to_snake_case;
use syn::{Field, Ident, ItemStruct, LitStr, Type, parse::ParseBuffer};

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    /// Identifier as written, without the raw prefix.
    pub(crate) raw: String,
    pub(crate) rename: Option<String>,
    pub(crate) skip: bool,
}

impl FieldMetadata {
    /// Column name when read from a row.
    pub(crate) fn column(&self) -> String {
        match &self.rename {
            Some(rename) => rename.clone(),
            None => to_snake_case(&self.raw),
        }
    }
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let raw = ident.to_string().trim_start_matches("r#").to_string();
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        raw,
        rename: None,
        skip: false,
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if meta.path().is_ident("sluice") {
            let Ok(list) = meta.require_list() else {
                panic!(
                    "Error while parsing `sluice`, use it like: `#[sluice(attribute = value, ...)]`",
                );
            };
            let _ = list.parse_nested_meta(|arg| {
                if arg.path.is_ident("name") {
                    let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                        panic!("Error while parsing `name`, use it like: `#[sluice(name = \"my_column\")]`");
                    };
                    metadata.rename = Some(v.value());
                } else if arg.path.is_ident("skip") {
                    let Err(..) = arg.value() else {
                        // value() is Err for Meta::Path
                        panic!("Error while parsing `skip`, use it like: `#[sluice(skip)]`");
                    };
                    metadata.skip = true;
                } else {
                    panic!(
                        "Unknown attribute `{}` inside sluice macro",
                        arg.path.to_token_stream()
                    );
                }
                Ok(())
            });
        }
    }
    metadata
}

pub(crate) fn decode_fields(item: &ItemStruct) -> Vec<FieldMetadata> {
    let syn::Fields::Named(..) = item.fields else {
        panic!(
            "`{}` must be a struct with named fields to derive Deconstruct or FromRow",
            item.ident
        );
    };
    item.fields.iter().map(decode_field).collect()
}
