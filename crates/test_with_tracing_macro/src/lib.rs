// Copyright (C) Microsoft Corporation. All rights reserved.

//! Procedural macro behind `test_with_tracing::test`.

use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::*;

/// Marks a function as a test that runs with the tracing subscriber
/// installed and inside a span named after the test.
///
/// The function must be synchronous and take no arguments. A return type,
/// if present, is preserved so fallible tests keep working.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemFn);
    make_traced_test(item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn make_traced_test(item: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    if item.sig.asyncness.is_some() {
        return Err(Error::new(
            item.sig.fn_token.span(),
            "test function must not be async",
        ));
    }
    if !item.sig.inputs.is_empty() {
        return Err(Error::new(item.sig.inputs.span(), "expected 0 arguments"));
    }

    let name = &item.sig.ident;
    let return_type = &item.sig.output;
    let attrs = &item.attrs;

    Ok(quote! {
        #[::core::prelude::v1::test]
        #(#attrs)*
        fn #name() #return_type {
            #item
            ::test_with_tracing::init();
            let span = ::test_with_tracing::tracing::info_span!(stringify!(#name));
            let _span_guard = span.enter();
            #name()
        }
    })
}
