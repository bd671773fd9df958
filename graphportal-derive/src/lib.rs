//! # graphportal Derive Macros
//!
//! This crate provides the procedural macros for `graphportal`. It implements
//! `MobileObject` and `MobileType` for business structs, so they can take part
//! in reference-preserving graph serialization.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `MobileObject` and `MobileType`.
///
/// Struct attributes:
/// * `#[mobile(type_key = "...")]` overrides the type identity
///   (default: `module_path!()::Name`).
/// * `#[mobile(track_status)]` answers status queries through the struct's own
///   `TrackStatus` implementation.
///
/// Field attributes:
/// * `#[mobile(opaque)]` embeds the field as a scalar blob, never as a child.
/// * `#[mobile(skip)]` leaves the field out; it is restored as `Default`.
#[proc_macro_derive(MobileObject, attributes(mobile))]
pub fn derive_mobile_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct TypeOptions {
    type_key: Option<LitStr>,
    track_status: bool,
}

#[derive(Default)]
struct FieldOptions {
    opaque: bool,
    skip: bool,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "MobileObject cannot be derived for generic structs",
        ));
    }

    let data_struct = match &input.data {
        Data::Struct(ds) => ds,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "MobileObject only supports structs",
            ));
        }
    };
    let fields: Vec<&syn::Field> = match &data_struct.fields {
        Fields::Named(named) => named.named.iter().collect(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new(
                name.span(),
                "MobileObject only supports structs with named fields",
            ));
        }
    };

    let options = parse_type_attributes(&input.attrs)?;

    let mut members = Vec::new();
    let mut opaque_keys = Vec::new();
    for field in fields {
        let field_options = parse_field_attributes(&field.attrs)?;
        if field_options.skip {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let key = LitStr::new(&ident.to_string(), ident.span());
        if field_options.opaque {
            opaque_keys.push(key.clone());
        }
        members.push((ident, key));
    }

    let write_state = members.iter().map(|(ident, key)| {
        quote! { graphportal::rt::Member::write_state(&self.#ident, #key, record)?; }
    });
    let write_children = members.iter().map(|(ident, key)| {
        quote! { graphportal::rt::Member::write_children(&self.#ident, #key, record, writer)?; }
    });
    let read_state = members.iter().map(|(ident, key)| {
        quote! { graphportal::rt::Member::read_state(&mut self.#ident, #key, record)?; }
    });
    let read_children = members.iter().map(|(ident, key)| {
        quote! { graphportal::rt::Member::read_children(&mut self.#ident, #key, record, reader)?; }
    });

    let key_expr = match &options.type_key {
        Some(lit) => quote! { ::std::string::String::from(#lit) },
        None => {
            let name_str = LitStr::new(&name.to_string(), name.span());
            quote! { ::std::string::String::from(concat!(module_path!(), "::", #name_str)) }
        }
    };

    let track_status = options.track_status;
    let status_impl = if track_status {
        quote! {
            fn status_flags(&self) -> ::std::option::Option<graphportal::field::StatusFlags> {
                ::std::option::Option::Some(graphportal::field::StatusFlags::capture(self))
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl graphportal::visitor::MobileObject for #name {
            fn type_key(&self) -> ::std::string::String {
                <Self as graphportal::visitor::MobileType>::key()
            }

            fn get_state(
                &self,
                record: &mut graphportal::format::SerializedRecord,
            ) -> graphportal::Result<()> {
                let _ = &record;
                #(#write_state)*
                Ok(())
            }

            fn get_children(
                &self,
                record: &mut graphportal::format::SerializedRecord,
                writer: &mut graphportal::writer::GraphWriter<'_>,
            ) -> graphportal::Result<()> {
                let _ = (&record, &writer);
                #(#write_children)*
                Ok(())
            }

            fn set_state(
                &mut self,
                record: &graphportal::format::SerializedRecord,
            ) -> graphportal::Result<()> {
                let _ = &record;
                #(#read_state)*
                Ok(())
            }

            fn set_children(
                &mut self,
                record: &graphportal::format::SerializedRecord,
                reader: &graphportal::reader::GraphReader<'_>,
            ) -> graphportal::Result<()> {
                let _ = (&record, &reader);
                #(#read_children)*
                Ok(())
            }

            #status_impl
        }

        impl graphportal::visitor::MobileType for #name {
            const TRACKS_STATUS: bool = #track_status;

            fn key() -> ::std::string::String {
                #key_expr
            }

            fn opaque_fields() -> &'static [&'static str] {
                &[#(#opaque_keys),*]
            }
        }
    })
}

fn parse_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeOptions> {
    let mut options = TypeOptions {
        type_key: None,
        track_status: false,
    };
    for attr in attrs {
        if attr.path().is_ident("mobile") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("type_key") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().is_empty() {
                        return Err(meta.error("type_key must not be empty"));
                    }
                    options.type_key = Some(lit);
                    return Ok(());
                }
                if meta.path.is_ident("track_status") {
                    options.track_status = true;
                    return Ok(());
                }
                Err(meta.error("Unknown mobile attribute key. Supported: type_key, track_status"))
            })?;
        }
    }
    Ok(options)
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs {
        if attr.path().is_ident("mobile") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("opaque") {
                    options.opaque = true;
                    return Ok(());
                }
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    return Ok(());
                }
                Err(meta.error("Unknown mobile field attribute key. Supported: opaque, skip"))
            })?;
        }
    }
    Ok(options)
}
