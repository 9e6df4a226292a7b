//! `#[client_interface]`: one proxy type per client interface.
//!
//! Every interface method becomes "send the message named after the method,
//! carrying the arguments in declared order". The proxy implements exactly the
//! interface's methods and is registered through `inventory` so the runtime
//! proxy registry can find it by the interface's `TypeId`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{Attribute, Ident, ItemTrait, LitStr, ReturnType, Signature, TraitItem, parse_quote};

use crate::util::{Param, is_shared_ref, receiver, typed_params};

struct ClientMethod {
    sig: Signature,
    wire_name: String,
    params: Vec<Param>,
}

/// Pull `#[hub(name = "...")]` out of `attrs`; returns the override if present.
fn take_wire_name(attrs: &mut Vec<Attribute>) -> syn::Result<Option<LitStr>> {
    let mut name = None;
    let mut err = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident("hub") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported hub attribute; expected `name = \"...\"`"))
            }
        });
        if let Err(e) = parsed {
            err = Some(e);
        }
        false
    });
    match err {
        Some(e) => Err(e),
        None => Ok(name),
    }
}

fn collect_methods(item: &mut ItemTrait) -> syn::Result<Vec<ClientMethod>> {
    let interface = item.ident.to_string();
    let mut seen: HashSet<String> = HashSet::new();
    let mut methods = Vec::new();

    for trait_item in &mut item.items {
        let TraitItem::Fn(method) = trait_item else {
            return Err(syn::Error::new_spanned(
                trait_item,
                format!("client interface `{interface}` may only declare methods"),
            ));
        };
        let ident = method.sig.ident.clone();

        if method.default.is_some() {
            return Err(syn::Error::new_spanned(
                &method.sig,
                format!("client interface `{interface}`: method `{ident}` must not have a default body"),
            ));
        }
        if method.sig.asyncness.is_none() {
            return Err(syn::Error::new_spanned(
                &method.sig,
                format!("client interface `{interface}`: method `{ident}` must be `async`"),
            ));
        }
        if !method.sig.generics.params.is_empty() {
            return Err(syn::Error::new_spanned(
                &method.sig.generics,
                format!("client interface `{interface}`: method `{ident}` must not be generic"),
            ));
        }
        if !receiver(&method.sig).is_some_and(is_shared_ref) {
            return Err(syn::Error::new_spanned(
                &method.sig,
                format!("client interface `{interface}`: method `{ident}` must take `&self`"),
            ));
        }
        if matches!(method.sig.output, ReturnType::Default) {
            return Err(syn::Error::new_spanned(
                &method.sig,
                format!(
                    "client interface `{interface}`: method `{ident}` must return `Result<(), TransportError>`"
                ),
            ));
        }
        let params = typed_params(&method.sig).map_err(|pat| {
            syn::Error::new_spanned(
                pat,
                format!("client interface `{interface}`: parameters of `{ident}` must be plain identifiers"),
            )
        })?;

        let wire_name = match take_wire_name(&mut method.attrs)? {
            Some(lit) => lit.value(),
            None => ident.to_string(),
        };
        if !seen.insert(wire_name.clone()) {
            return Err(syn::Error::new_spanned(
                &method.sig.ident,
                format!("client interface `{interface}` declares message `{wire_name}` more than once"),
            ));
        }

        methods.push(ClientMethod {
            sig: method.sig.clone(),
            wire_name,
            params,
        });
    }
    Ok(methods)
}

fn proxy_method(method: &ClientMethod) -> TokenStream {
    let ClientMethod {
        sig,
        wire_name,
        params,
    } = method;
    // Bodies bind plain identifiers; drop `mut` from the declared patterns.
    let mut sig = sig.clone();
    for input in &mut sig.inputs {
        if let syn::FnArg::Typed(pat_type) = input
            && let syn::Pat::Ident(pat) = &mut *pat_type.pat
        {
            pat.mutability = None;
        }
    }
    let args = params.iter().map(|p| {
        let ident = &p.ident;
        quote! {
            ::hubkit::__private::serde_json::to_value(&#ident).map_err(|source| {
                ::hubkit::TransportError::Serialize { message: #wire_name, source }
            })?
        }
    });
    quote! {
        #sig {
            let arguments = ::std::vec![#(#args),*];
            ::core::result::Result::Ok(self.sender.send(#wire_name, arguments).await?)
        }
    }
}

pub fn expand(mut item: ItemTrait) -> syn::Result<TokenStream> {
    let interface = item.ident.clone();
    let interface_name = interface.to_string();
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            format!("client interface `{interface_name}` must not be generic"),
        ));
    }

    let methods = collect_methods(&mut item)?;
    item.colon_token.get_or_insert_with(Default::default);
    item.supertraits.push(parse_quote!(::core::marker::Send));
    item.supertraits.push(parse_quote!(::core::marker::Sync));

    let vis = &item.vis;
    let proxy: Ident = format_ident!("{}Proxy", interface);
    let proxy_name = proxy.to_string();
    let proxy_doc = format!("Generated sender for [`{interface_name}`]; one named message per call.");
    let proxy_methods = methods.iter().map(proxy_method);

    Ok(quote! {
        #[::hubkit::__private::async_trait]
        #item

        #[doc = #proxy_doc]
        #[derive(Clone, Debug)]
        #vis struct #proxy {
            sender: ::hubkit::ClientSender,
        }

        impl #proxy {
            #[must_use]
            pub fn new(sender: ::hubkit::ClientSender) -> Self {
                Self { sender }
            }

            #[must_use]
            pub fn sender(&self) -> &::hubkit::ClientSender {
                &self.sender
            }
        }

        #[::hubkit::__private::async_trait]
        impl #interface for #proxy {
            #(#proxy_methods)*
        }

        impl ::hubkit::ClientInterface for dyn #interface {
            const NAME: &'static str = #interface_name;
        }

        const _: () = {
            fn interface_id() -> ::core::any::TypeId {
                ::core::any::TypeId::of::<dyn #interface>()
            }

            fn construct(sender: ::hubkit::ClientSender) -> ::hubkit::proxy::BoxedProxy {
                let proxy: ::std::sync::Arc<dyn #interface> =
                    ::std::sync::Arc::new(#proxy::new(sender));
                ::std::boxed::Box::new(proxy)
            }

            ::hubkit::__private::inventory::submit! {
                ::hubkit::ProxyRegistration::new(interface_id, #interface_name, #proxy_name, construct)
            }
        };
    })
}
