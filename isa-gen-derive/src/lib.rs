//! Internal implementation details of `isa-gen`.
//!
//! Do not use this crate directly!

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Error, Result};

/// Derives a lookup table of operand-type names to target-type names from
/// an enum whose variants are each annotated with `#[payload(name = "...",
/// target = "...")]`.
///
/// Rather than hand-writing the match arms an
/// `IsaConfig::operand_payload_types` implementation needs, a caller
/// derives them from one enum listing the ISA's operand kinds.
#[proc_macro_derive(OperandPayloads, attributes(payload))]
pub fn operand_payloads(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impl_operand_payloads(&ast)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn impl_operand_payloads(ast: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let data = match &ast.data {
        syn::Data::Enum(data) => data,
        _ => {
            return Err(Error::new(
                Span::call_site(),
                "#[derive(OperandPayloads)] can only be applied to enums",
            ))
        }
    };

    let name = &ast.ident;
    let mut name_arms = Vec::new();
    let mut target_arms = Vec::new();
    let mut variants = Vec::new();

    for variant in &data.variants {
        let vident = &variant.ident;
        let (payload_name, target) = extract_payload_attributes(variant)?;
        name_arms.push(quote! { #name::#vident => #payload_name });
        target_arms.push(quote! { #name::#vident => #target });
        variants.push(quote! { #name::#vident });
    }

    Ok(quote! {
        impl #name {
            /// The operand-type name this variant corresponds to, as it
            /// appears in a TableGen dump (e.g. `"GPR"`).
            pub fn payload_name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }

            /// The target-language type name a caller's `IsaConfig`
            /// should record for this operand type.
            pub fn target_type(&self) -> &'static str {
                match self {
                    #(#target_arms),*
                }
            }

            /// All variants, in declaration order.
            pub fn all() -> &'static [#name] {
                &[#(#variants),*]
            }
        }
    })
}

fn extract_payload_attributes(variant: &syn::Variant) -> Result<(String, String)> {
    let attr = variant
        .attrs
        .iter()
        .find(|a| a.path.segments.len() == 1 && a.path.segments[0].ident == "payload")
        .ok_or_else(|| {
            Error::new(
                variant.ident.span(),
                "missing #[payload(name = \"...\", target = \"...\")] attribute",
            )
        })?;

    let meta = attr.parse_meta()?;
    let nested_list = match meta {
        syn::Meta::List(ref list) => list,
        _ => {
            return Err(Error::new(
                attr.path.segments[0].ident.span(),
                "#[payload] is expecting arguments in list-style",
            ))
        }
    };

    let mut name = None;
    let mut target = None;
    for nested in &nested_list.nested {
        if let syn::NestedMeta::Meta(syn::Meta::NameValue(value)) = nested {
            if value.path.is_ident("name") {
                name = Some(parse_str_lit(&value.lit, "name")?);
            } else if value.path.is_ident("target") {
                target = Some(parse_str_lit(&value.lit, "target")?);
            }
        }
    }

    let name = name.ok_or_else(|| {
        Error::new(
            variant.ident.span(),
            "#[payload] is missing a \"name\" argument",
        )
    })?;
    let target = target.ok_or_else(|| {
        Error::new(
            variant.ident.span(),
            "#[payload] is missing a \"target\" argument",
        )
    })?;
    Ok((name, target))
}

fn parse_str_lit(lit: &syn::Lit, field: &str) -> Result<String> {
    if let syn::Lit::Str(s) = lit {
        Ok(s.value())
    } else {
        Err(Error::new(
            Span::call_site(),
            format!("\"{}\" must be a string literal", field),
        ))
    }
}
