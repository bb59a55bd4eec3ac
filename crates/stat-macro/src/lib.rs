// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Field;
use syn::FieldsNamed;
use syn::Ident;
use syn::parse_macro_input;

/// Generate a [`ipid::sys::stat::StatProvider`] implementation given
/// a struct of named fields of type [`ipid::sys::stat::StatU32`].
///
/// ```Rust
/// #[derive(StatProvider)]
/// struct EgressStats {
///     modified: StatU32,
///     random: StatU32,
/// }
/// ```
///
/// This macro generates the following code based on the struct above.
///
/// ```Rust
/// #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
/// pub struct EgressStatsSnap {
///     pub modified: u32,
///     pub random: u32,
/// }
///
/// impl StatProvider for EgressStats {
///     const NUM_FIELDS: u32 = 2;
///     const FIELD_NAMES: &'static [&'static str] = &["modified", "random"];
///     type Snap = EgressStatsSnap;
///
///     fn new() -> Self {
///         Self { modified: StatU32::new(), random: StatU32::new() }
///     }
///
///     fn snapshot(&self) -> Self::Snap {
///         EgressStatsSnap {
///             modified: self.modified.val(),
///             random: self.random.val(),
///         }
///     }
/// }
/// ```
#[proc_macro_derive(StatProvider)]
pub fn derive_stat_provider(input: TokenStream) -> TokenStream {
    let DeriveInput { ident, data, .. } = parse_macro_input!(input);
    let fields: Vec<Field> = match data {
        syn::Data::Struct(s) => match s.fields {
            syn::Fields::Named(FieldsNamed { named, .. }) => {
                named.into_iter().collect()
            }

            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "a StatProvider must have named fields",
                )
                .to_compile_error()
                .into();
            }
        },

        _ => {
            return syn::Error::new(
                Span::call_site(),
                "only a struct may be a StatProvider",
            )
            .to_compile_error()
            .into();
        }
    };

    let num_fields = fields.len() as u32;
    let fields_ident: Vec<Ident> =
        fields.iter().filter_map(|f| f.ident.clone()).collect();
    let ident_snap = format_ident!("{}Snap", ident);

    let output = quote! {
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            Eq,
            PartialEq,
            ::serde::Deserialize,
            ::serde::Serialize,
        )]
        pub struct #ident_snap {
            #( pub #fields_ident: u32, )*
        }

        impl ::ipid::sys::stat::StatProvider for #ident {
            const NUM_FIELDS: u32 = #num_fields;
            const FIELD_NAMES: &'static [&'static str] =
                &[#( stringify!(#fields_ident), )*];
            type Snap = #ident_snap;

            fn new() -> Self {
                use ::ipid::sys::stat::StatU32;

                Self {
                    #( #fields_ident: StatU32::new(), )*
                }
            }

            fn snapshot(&self) -> Self::Snap {
                #ident_snap {
                    #( #fields_ident: self.#fields_ident.val(), )*
                }
            }
        }
    };

    output.into()
}
