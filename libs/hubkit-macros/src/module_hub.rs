//! `#[module_hub]`: `ModuleHub` for a module struct.
//!
//! The struct's single `HubState<..>` field carries the module's client
//! interface as its type argument; bare `HubState` means no client interface.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    GenericArgument, ItemStruct, Member, PathArguments, Type, TypeParamBound, meta::ParseNestedMeta,
};

use crate::util::last_segment_is;

#[derive(Default)]
pub struct ModuleHubArgs {
    ctor: Option<syn::Path>,
}

impl ModuleHubArgs {
    pub fn parse(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("ctor") {
            if self.ctor.is_some() {
                return Err(meta.error("duplicate `ctor`"));
            }
            self.ctor = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported module_hub argument; expected `ctor = path`"))
        }
    }
}

fn malformed(module: &str, span: impl ToTokens, detail: &str) -> syn::Error {
    syn::Error::new_spanned(
        span,
        format!("module `{module}`: malformed base type: {detail}"),
    )
}

/// `dyn Trait` (single trait bound, lifetimes allowed).
fn is_client_object(ty: &Type) -> bool {
    let Type::TraitObject(obj) = ty else {
        return false;
    };
    obj.dyn_token.is_some()
        && obj
            .bounds
            .iter()
            .filter(|b| matches!(b, TypeParamBound::Trait(_)))
            .count()
            == 1
}

/// The client interface type carried by a `HubState` field type.
fn client_type(module: &str, ty: &Type) -> syn::Result<TokenStream> {
    let Type::Path(path) = ty else {
        return Err(malformed(module, ty, "expected `HubState<dyn ClientInterface>`"));
    };
    let Some(last) = path.path.segments.last() else {
        return Err(malformed(module, ty, "expected `HubState<dyn ClientInterface>`"));
    };
    match &last.arguments {
        PathArguments::None => Ok(quote!(dyn ::hubkit::NoClient)),
        PathArguments::AngleBracketed(args) => {
            let mut types = args.args.iter();
            match (types.next(), types.next()) {
                (Some(GenericArgument::Type(client)), None) if is_client_object(client) => {
                    Ok(client.to_token_stream())
                }
                _ => Err(malformed(
                    module,
                    ty,
                    "`HubState` takes a single `dyn ClientInterface` type argument",
                )),
            }
        }
        PathArguments::Parenthesized(_) => Err(malformed(
            module,
            ty,
            "`HubState` takes a single `dyn ClientInterface` type argument",
        )),
    }
}

pub fn expand(args: &ModuleHubArgs, item: ItemStruct) -> syn::Result<TokenStream> {
    let ident = &item.ident;
    let module = ident.to_string();
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            format!("module `{module}` must not be generic"),
        ));
    }

    let states: Vec<(Member, &Type)> = item
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| last_segment_is(&f.ty, "HubState"))
        .map(|(index, f)| {
            let member = match &f.ident {
                Some(name) => Member::Named(name.clone()),
                None => Member::Unnamed(index.into()),
            };
            (member, &f.ty)
        })
        .collect();

    let (member, state_ty) = match states.as_slice() {
        [single] => single.clone(),
        [] => {
            return Err(malformed(
                &module,
                ident,
                "expected exactly one `HubState<dyn ClientInterface>` field, found none",
            ));
        }
        many => {
            return Err(malformed(
                &module,
                ident,
                &format!(
                    "expected exactly one `HubState<dyn ClientInterface>` field, found {}",
                    many.len()
                ),
            ));
        }
    };
    let client = client_type(&module, state_ty)?;

    let create = match &args.ctor {
        Some(ctor) => quote! {
            fn create(services: &::hubkit::HubServices) -> Self {
                #ctor(services)
            }
        },
        None => quote! {
            fn create(_services: &::hubkit::HubServices) -> Self {
                <Self as ::core::default::Default>::default()
            }
        },
    };

    Ok(quote! {
        #item

        impl ::hubkit::ModuleHub for #ident {
            const NAME: &'static str = #module;
            type Client = #client;

            #create

            fn hub_state(&self) -> &::hubkit::HubState<Self::Client> {
                &self.#member
            }
        }
    })
}
