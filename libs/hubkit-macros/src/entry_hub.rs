//! `#[entry_hub]`: the connection endpoint and its ordered module list.
//!
//! Emits `HubEntry` (module list in declaration order, fan-out helpers),
//! `Attached<M>` per module, a compile-time check that no two modules produce
//! the same `<Module>_<method>` name, and, unless `lifecycle = manual`, an
//! `EntryLifecycle` impl whose hooks run the fan-out.

use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{Fields, ItemStruct, Path, meta::ParseNestedMeta, parse_quote};

use crate::util::last_segment_is;

#[derive(Default)]
pub struct EntryHubArgs {
    modules: Vec<Path>,
    manual_lifecycle: bool,
}

impl EntryHubArgs {
    pub fn parse(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("modules") {
            meta.parse_nested_meta(|module| {
                self.modules.push(module.path);
                Ok(())
            })
        } else if meta.path.is_ident("lifecycle") {
            let mode: syn::Ident = meta.value()?.parse()?;
            match mode.to_string().as_str() {
                "manual" => self.manual_lifecycle = true,
                "generated" => self.manual_lifecycle = false,
                _ => {
                    return Err(syn::Error::new_spanned(
                        mode,
                        "expected `lifecycle = manual` or `lifecycle = generated`",
                    ));
                }
            }
            Ok(())
        } else {
            Err(meta.error("unsupported entry_hub argument; expected `modules(...)` or `lifecycle = ...`"))
        }
    }
}

fn module_name(path: &Path) -> String {
    path.segments
        .last()
        .map(|seg| seg.ident.to_string())
        .unwrap_or_default()
}

pub fn expand(args: &EntryHubArgs, mut item: ItemStruct) -> syn::Result<TokenStream> {
    let ident = item.ident.clone();
    let entry = ident.to_string();
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            format!("entry hub `{entry}` must not be generic"),
        ));
    }

    let mut seen = HashSet::new();
    for module in &args.modules {
        let name = module_name(module);
        if !seen.insert(name.clone()) {
            return Err(syn::Error::new_spanned(
                module,
                format!("entry hub `{entry}`: module `{name}` is attached more than once"),
            ));
        }
    }

    // A unit struct gets the connection field injected.
    if matches!(item.fields, Fields::Unit) {
        item.fields = Fields::Named(parse_quote!({ connection: ::hubkit::HubConnection }));
        item.semi_token = None;
    }
    let Fields::Named(named) = &item.fields else {
        return Err(syn::Error::new_spanned(
            &item.ident,
            format!("entry hub `{entry}` must be a unit struct or have named fields"),
        ));
    };
    let connections: Vec<_> = named
        .named
        .iter()
        .filter(|f| last_segment_is(&f.ty, "HubConnection"))
        .collect();
    let [connection] = connections.as_slice() else {
        return Err(syn::Error::new_spanned(
            &item.ident,
            format!("entry hub `{entry}` needs exactly one `HubConnection` field"),
        ));
    };
    let connection = connection.ident.clone();
    let others = named
        .named
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .filter(|f| Some(*f) != connection.as_ref());

    let modules = &args.modules;
    let unique_routes = format!(
        "entry hub `{entry}`: two attached modules produce the same forwarding method name"
    );
    let lifecycle = (!args.manual_lifecycle).then(|| {
        quote! {
            impl ::hubkit::EntryLifecycle for #ident {}
        }
    });

    Ok(quote! {
        #item

        impl ::hubkit::HubEntry for #ident {
            const NAME: &'static str = #entry;
            const MODULES: &'static [::hubkit::AttachedModule] = &[
                #(::hubkit::AttachedModule::of::<#modules>()),*
            ];

            fn from_connection(connection: ::hubkit::HubConnection) -> Self {
                Self {
                    #connection: connection,
                    #(#others: ::core::default::Default::default(),)*
                }
            }

            fn connection(&self) -> &::hubkit::HubConnection {
                &self.#connection
            }
        }

        #(impl ::hubkit::Attached<#modules> for #ident {})*

        const _: () = ::core::assert!(
            ::hubkit::__private::routes_unique(<#ident as ::hubkit::HubEntry>::MODULES),
            #unique_routes,
        );

        #lifecycle
    })
}
