use syn::{FnArg, Pat, Receiver, Signature, Type};

/// Last path segment of `ty` is `name` (`HubState`, `hubkit::HubState<..>`).
pub fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(p) if p.qself.is_none() => p
            .path
            .segments
            .last()
            .is_some_and(|seg| seg.ident == name),
        _ => false,
    }
}

/// `&self`, not `&mut self` or `self`.
pub fn is_shared_ref(receiver: &Receiver) -> bool {
    receiver.reference.is_some() && receiver.mutability.is_none()
}

pub fn receiver(sig: &Signature) -> Option<&Receiver> {
    match sig.inputs.first() {
        Some(FnArg::Receiver(r)) => Some(r),
        _ => None,
    }
}

/// Owned types only: no references, no `impl Trait`.
pub fn is_owned(ty: &Type) -> bool {
    match ty {
        Type::Reference(_) | Type::ImplTrait(_) => false,
        Type::Paren(inner) => is_owned(&inner.elem),
        Type::Group(inner) => is_owned(&inner.elem),
        _ => true,
    }
}

/// A parameter bound to a plain identifier.
pub struct Param {
    pub ident: syn::Ident,
    pub ty: Type,
}

/// Typed parameters after the receiver; `None` for the first non-identifier pattern.
pub fn typed_params(sig: &Signature) -> Result<Vec<Param>, &syn::PatType> {
    let mut params = Vec::new();
    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            match &*pat_type.pat {
                Pat::Ident(pat) if pat.subpat.is_none() && pat.by_ref.is_none() => {
                    params.push(Param {
                        ident: pat.ident.clone(),
                        ty: (*pat_type.ty).clone(),
                    });
                }
                _ => return Err(pat_type),
            }
        }
    }
    Ok(params)
}
