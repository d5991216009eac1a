//! The `#[scenario]` attribute for SDK scenario tests.
//!
//! Registers a function with the scenario registry in `scenario_core` so the runner can discover it without
//! reflection. The function itself is left untouched.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{ItemFn, LitStr, parse_macro_input};

/// Registers a scenario.
///
/// # Options
///
/// - `traits(Key = "value", ...)`: trait tags used by `--traits` / `--no-traits`; keys may repeat
/// - `skip = "reason"`: always report the scenario as skipped
///
/// # Example
/// ```ignore
/// #[scenario(traits(Category = "Offline"))]
/// fn new_console_project_builds() -> ScenarioResult {
///     let environment = ScenarioEnvironment::current()?;
///     // ...
///     Ok(())
/// }
///
/// // Generates (besides keeping the function):
/// inventory::submit! {
///     ScenarioDescriptor {
///         name: concat!(module_path!(), "::", "new_console_project_builds"),
///         traits: &[("Category", "Offline")],
///         skip: None,
///         file: file!(),
///         line: line!(),
///         body: new_console_project_builds,
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn scenario(args: TokenStream, item: TokenStream) -> TokenStream {
    let mut options = ScenarioOptions::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    parse_macro_input!(args with parser);

    let function = parse_macro_input!(item as ItemFn);

    match expand(options, function) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ScenarioOptions {
    traits: Vec<(String, LitStr)>,
    skip: Option<LitStr>,
}

impl ScenarioOptions {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("traits") {
            meta.parse_nested_meta(|inner| {
                let key = inner
                    .path
                    .get_ident()
                    .ok_or_else(|| inner.error("expected a trait name such as `Category`"))?
                    .to_string();
                let value: LitStr = inner.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(syn::Error::new(value.span(), "trait values must not be empty"));
                }
                self.traits.push((key, value));
                Ok(())
            })
        } else if meta.path.is_ident("skip") {
            self.skip = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported scenario option; expected `traits(...)` or `skip = \"...\"`"))
        }
    }
}

fn expand(options: ScenarioOptions, function: ItemFn) -> syn::Result<TokenStream2> {
    let signature = &function.sig;
    if !signature.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &signature.inputs,
            "scenarios take no parameters; read run parameters from `ScenarioEnvironment::current()`",
        ));
    }
    if let Some(asyncness) = &signature.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "scenarios must be synchronous"));
    }
    if !signature.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&signature.generics, "scenarios cannot be generic"));
    }

    let ident = &signature.ident;
    let keys = options.traits.iter().map(|(key, _)| key);
    let values = options.traits.iter().map(|(_, value)| value);
    let skip = match &options.skip {
        Some(reason) => quote!(::core::option::Option::Some(#reason)),
        None => quote!(::core::option::Option::None),
    };

    Ok(quote! {
        #function

        ::scenario_core::inventory::submit! {
            ::scenario_core::ScenarioDescriptor {
                name: ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#ident)),
                traits: &[#((#keys, #values)),*],
                skip: #skip,
                file: ::core::file!(),
                line: ::core::line!(),
                body: #ident,
            }
        }
    })
}
