//! `#[hub_methods]`: the dispatch surface of one module.
//!
//! From the module's inherent impl block this emits:
//! - `impl ModuleMethods`: route table, positional-JSON `invoke`, lifecycle hooks
//! - `<Module>Dispatch`: one `<Module>_<method>` forwarding method per exposed
//!   method, blanket-implemented for every entry hub with `Attached<Module>`
//!
//! Exposed: `pub` methods taking `&self`. Skipped: associated functions and the
//! `on_connected` / `on_disconnected` hooks.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, ImplItem, ImplItemFn, ItemImpl, ReturnType, Type, Visibility};

use crate::util::{Param, is_owned, is_shared_ref, last_segment_is, receiver, typed_params};

const ON_CONNECTED: &str = "on_connected";
const ON_DISCONNECTED: &str = "on_disconnected";

struct HubMethod {
    ident: Ident,
    route: String,
    params: Vec<Param>,
    output: ReturnType,
    is_async: bool,
    returns_result: bool,
}

#[derive(Default)]
struct Hooks {
    connected: bool,
    disconnected: bool,
}

fn module_ident(item: &ItemImpl) -> syn::Result<Ident> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[hub_methods] goes on the module's inherent impl block, not a trait impl",
        ));
    }
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[hub_methods] does not support generic modules",
        ));
    }
    match &*item.self_ty {
        Type::Path(p) if p.qself.is_none() => match p.path.segments.last() {
            Some(seg) if seg.arguments.is_none() => Ok(seg.ident.clone()),
            _ => Err(syn::Error::new_spanned(&item.self_ty, "expected a module type")),
        },
        other => Err(syn::Error::new_spanned(other, "expected a module type")),
    }
}

fn check_hook(module: &str, method: &ImplItemFn, arity: usize) -> syn::Result<()> {
    let ident = &method.sig.ident;
    let params = method.sig.inputs.len().saturating_sub(1);
    if method.sig.asyncness.is_none() || params != arity || !method.sig.generics.params.is_empty() {
        let expected = if arity == 0 {
            "async fn on_connected(&self)"
        } else {
            "async fn on_disconnected(&self, cause: Option<&anyhow::Error>)"
        };
        return Err(syn::Error::new_spanned(
            &method.sig,
            format!("module `{module}`: hook `{ident}` must be `{expected}`"),
        ));
    }
    Ok(())
}

fn exposed_method(module: &str, method: &ImplItemFn) -> syn::Result<HubMethod> {
    let ident = method.sig.ident.clone();
    if !receiver(&method.sig).is_some_and(is_shared_ref) {
        return Err(syn::Error::new_spanned(
            &method.sig,
            format!("hub method `{module}::{ident}` must take `&self`"),
        ));
    }
    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &method.sig.generics,
            format!("hub method `{module}::{ident}` must not be generic"),
        ));
    }
    let params = typed_params(&method.sig).map_err(|pat| {
        syn::Error::new_spanned(
            pat,
            format!("hub method `{module}::{ident}`: parameters must be plain identifiers"),
        )
    })?;
    if let Some(param) = params.iter().find(|p| !is_owned(&p.ty)) {
        return Err(syn::Error::new_spanned(
            &param.ty,
            format!(
                "hub method `{module}::{ident}`: parameter `{}` must be an owned type",
                param.ident
            ),
        ));
    }
    let returns_result = match &method.sig.output {
        ReturnType::Default => false,
        ReturnType::Type(_, ty) => {
            if !is_owned(ty) {
                return Err(syn::Error::new_spanned(
                    ty,
                    format!("hub method `{module}::{ident}` must return an owned type"),
                ));
            }
            last_segment_is(ty, "Result")
        }
    };

    Ok(HubMethod {
        route: format!("{module}_{ident}"),
        ident,
        params,
        output: method.sig.output.clone(),
        is_async: method.sig.asyncness.is_some(),
        returns_result,
    })
}

fn collect(module: &str, item: &ItemImpl) -> syn::Result<(Vec<HubMethod>, Hooks)> {
    let mut methods = Vec::new();
    let mut hooks = Hooks::default();
    for impl_item in &item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let name = method.sig.ident.to_string();
        if name == ON_CONNECTED {
            check_hook(module, method, 0)?;
            hooks.connected = true;
            continue;
        }
        if name == ON_DISCONNECTED {
            check_hook(module, method, 1)?;
            hooks.disconnected = true;
            continue;
        }
        let is_pub = matches!(method.vis, Visibility::Public(_));
        if !is_pub || receiver(&method.sig).is_none() {
            continue;
        }
        methods.push(exposed_method(module, method)?);
    }
    Ok((methods, hooks))
}

fn invoke_arm(method: &HubMethod) -> TokenStream {
    let HubMethod {
        ident,
        route,
        params,
        is_async,
        returns_result,
        ..
    } = method;
    let arity = params.len();
    let bindings = params.iter().enumerate().map(|(index, p)| {
        let name = &p.ident;
        let ty = &p.ty;
        quote! {
            let #name: #ty = ::hubkit::__private::next_arg(#route, #index, &mut args)?;
        }
    });
    let names = params.iter().map(|p| &p.ident);
    let call = if *is_async {
        quote!(Self::#ident(self, #(#names),*).await)
    } else {
        quote!(Self::#ident(self, #(#names),*))
    };
    let unpack = if arity == 0 {
        quote!()
    } else {
        quote!(let mut args = args.into_iter();)
    };
    let finish = if *returns_result {
        quote! {
            match #call {
                ::core::result::Result::Ok(value) => ::hubkit::__private::reply(#route, &value),
                ::core::result::Result::Err(error) => {
                    ::core::result::Result::Err(::hubkit::__private::fail(#route, error))
                }
            }
        }
    } else {
        quote! {
            let value = #call;
            ::hubkit::__private::reply(#route, &value)
        }
    };
    quote! {
        #route => {
            ::hubkit::__private::check_arity(#route, &args, #arity)?;
            #unpack
            #(#bindings)*
            #finish
        }
    }
}

fn forwarding_method(module: &Ident, method: &HubMethod) -> TokenStream {
    let HubMethod {
        ident,
        route,
        params,
        output,
        is_async,
        ..
    } = method;
    let forward = format_ident!("{}", route);
    let names: Vec<&Ident> = params.iter().map(|p| &p.ident).collect();
    let types = params.iter().map(|p| &p.ty);
    let doc = format!("Forwards to [`{module}::{ident}`] on this connection's instance.");
    if *is_async {
        quote! {
            #[doc = #doc]
            async fn #forward(&self, #(#names: #types),*) #output {
                let module = ::hubkit::HubEntry::connection(self).module::<#module>();
                module.#ident(#(#names),*).await
            }
        }
    } else {
        quote! {
            #[doc = #doc]
            fn #forward(&self, #(#names: #types),*) #output {
                let module = ::hubkit::HubEntry::connection(self).module::<#module>();
                module.#ident(#(#names),*)
            }
        }
    }
}

fn hook_impls(hooks: &Hooks) -> TokenStream {
    let connected = hooks.connected.then(|| {
        quote! {
            async fn hook_connected(&self) -> ::hubkit::__private::anyhow::Result<()> {
                ::core::result::Result::map_err(
                    Self::on_connected(self).await,
                    ::core::convert::Into::into,
                )
            }
        }
    });
    let disconnected = hooks.disconnected.then(|| {
        quote! {
            async fn hook_disconnected(
                &self,
                cause: ::core::option::Option<&::hubkit::__private::anyhow::Error>,
            ) -> ::hubkit::__private::anyhow::Result<()> {
                ::core::result::Result::map_err(
                    Self::on_disconnected(self, cause).await,
                    ::core::convert::Into::into,
                )
            }
        }
    });
    quote!(#connected #disconnected)
}

pub fn expand(item: ItemImpl) -> syn::Result<TokenStream> {
    let module = module_ident(&item)?;
    let module_name = module.to_string();
    let (methods, hooks) = collect(&module_name, &item)?;

    let routes = methods.iter().map(|m| &m.route);
    let arms = methods.iter().map(invoke_arm);
    let hooks = hook_impls(&hooks);
    let dispatch = format_ident!("{}Dispatch", module);
    let dispatch_doc = format!(
        "`{module_name}_<method>` forwarding methods for entry hubs that attach [`{module_name}`]."
    );
    let forwards = methods.iter().map(|m| forwarding_method(&module, m));
    let args_ident = if methods.is_empty() {
        quote!(_args)
    } else {
        quote!(args)
    };

    Ok(quote! {
        #item

        #[::hubkit::__private::async_trait]
        impl ::hubkit::ModuleMethods for #module {
            const ROUTES: &'static [&'static str] = &[#(#routes),*];

            async fn invoke(
                &self,
                route: &str,
                #args_ident: ::std::vec::Vec<::hubkit::__private::serde_json::Value>,
            ) -> ::core::result::Result<::hubkit::__private::serde_json::Value, ::hubkit::InvokeError> {
                match route {
                    #(#arms)*
                    _ => ::core::result::Result::Err(::hubkit::InvokeError::UnknownMethod {
                        entry: <Self as ::hubkit::ModuleHub>::NAME,
                        method: ::std::borrow::ToOwned::to_owned(route),
                    }),
                }
            }

            #hooks
        }

        #[doc = #dispatch_doc]
        #[allow(non_snake_case)]
        #[::hubkit::__private::async_trait]
        pub trait #dispatch: ::hubkit::HubEntry + ::hubkit::Attached<#module> {
            #(#forwards)*
        }

        impl<E: ::hubkit::HubEntry + ::hubkit::Attached<#module>> #dispatch for E {}
    })
}
