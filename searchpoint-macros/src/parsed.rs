use std::collections::BTreeSet;

use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, LitStr, Result};

pub(crate) struct ParsedRecord {
    name: Ident,
    generics: Generics,
    accessors: Vec<Accessor>,
}

enum Source {
    Field(Ident),
    Method(Ident),
}

struct Accessor {
    key: String,
    source: Source,
}

fn ensure_unique(accessors: &[Accessor]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for accessor in accessors {
        if !seen.insert(accessor.key.as_str()) {
            let span = match &accessor.source {
                Source::Field(ident) | Source::Method(ident) => ident.span(),
            };
            return Err(Error::new(span, format!("duplicate record field `{}`", accessor.key)));
        }
    }
    Ok(())
}

impl ParsedRecord {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => &named.named,
                _ => return Err(Error::new(input.ident.span(), "Record requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "Record can only be derived for structs")),
        };

        let mut accessors = Vec::new();
        for field in named {
            if let Some(accessor) = Self::parse_field(field)? {
                accessors.push(accessor);
            }
        }
        for attr in &input.attrs {
            if attr.path().is_ident("record") {
                Self::parse_container_attr(attr, &mut accessors)?;
            }
        }

        ensure_unique(&accessors)?;

        Ok(Self {
            name: input.ident.clone(),
            generics: input.generics.clone(),
            accessors,
        })
    }

    fn parse_field(field: &Field) -> Result<Option<Accessor>> {
        let Some(ident) = field.ident.clone() else {
            return Err(Error::new(Span::call_site(), "Record requires named fields"));
        };
        let mut key = ident.to_string().trim_start_matches("r#").to_string();
        let mut skip = false;

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().is_empty() {
                        return Err(meta.error("#[record(rename)] needs a non-empty name"));
                    }
                    key = value.value();
                } else {
                    return Err(meta.error("unknown record field attribute, expected skip or rename"));
                }
                Ok(())
            })?;
        }

        Ok((!skip).then(|| Accessor {
            key,
            source: Source::Field(ident),
        }))
    }

    fn parse_container_attr(attr: &Attribute, accessors: &mut Vec<Accessor>) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("computed") {
                let value: LitStr = meta.value()?.parse()?;
                let method: Ident = value.parse()?;
                accessors.push(Accessor {
                    key: value.value(),
                    source: Source::Method(method),
                });
                Ok(())
            } else {
                Err(meta.error("unknown record attribute, expected computed = \"method\""))
            }
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let (impl_generics, ty_generics, where_clause) = self.generics.split_for_impl();

        let keys: Vec<&str> = self.accessors.iter().map(|accessor| accessor.key.as_str()).collect();
        let arms = self.accessors.iter().map(|accessor| {
            let key = &accessor.key;
            let read = match &accessor.source {
                Source::Field(ident) => quote! { &self.#ident },
                Source::Method(ident) => quote! { &self.#ident() },
            };
            quote! {
                #key => ::core::option::Option::Some(
                    ::searchpoint::__private::serde_json::to_value(#read).unwrap_or_default()
                ),
            }
        });

        quote! {
            impl #impl_generics ::searchpoint::record::Record for #name #ty_generics #where_clause {
                fn field(&self, name: &str) -> ::core::option::Option<::searchpoint::__private::serde_json::Value> {
                    match name {
                        #(#arms)*
                        _ => ::core::option::Option::None,
                    }
                }

                fn known_fields() -> ::core::option::Option<&'static [&'static str]> {
                    ::core::option::Option::Some(&[#(#keys),*])
                }
            }
        }
    }
}
