#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Code generators behind `hubkit`.
//!
//! - `#[client_interface]`: one proxy type per client interface, registered for run-time resolution
//! - `#[module_hub]`: `ModuleHub` for a module struct
//! - `#[hub_methods]`: route table, dynamic invoke and `<Module>Dispatch` forwarding trait
//! - `#[entry_hub]`: ordered module list, `Attached` markers, lifecycle fan-out
//!
//! Generated code refers to the runtime as `::hubkit`.

use proc_macro::TokenStream;
use syn::{ItemImpl, ItemStruct, ItemTrait, parse_macro_input};

mod client_interface;
mod entry_hub;
mod hub_methods;
mod module_hub;
mod util;

/// Turn a trait into a client interface with a generated `<Trait>Proxy`.
///
/// ```ignore
/// #[hubkit::client_interface]
/// pub trait WeatherClient {
///     #[hub(name = "ReceiveWeatherUpdate")]
///     async fn receive_weather_update(&self, forecast: Forecast) -> Result<(), TransportError>;
/// }
/// ```
#[proc_macro_attribute]
pub fn client_interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[client_interface] takes no arguments",
        )
        .to_compile_error()
        .into();
    }
    let item = parse_macro_input!(item as ItemTrait);
    client_interface::expand(item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implement `ModuleHub` for a struct holding one `HubState<dyn Client>` field.
///
/// `#[module_hub(ctor = path::to::fn)]` builds instances with `fn(&HubServices) -> Self`
/// instead of `Default`.
#[proc_macro_attribute]
pub fn module_hub(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = module_hub::ModuleHubArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(&meta));
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as ItemStruct);
    module_hub::expand(&args, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Expose the `pub fn(&self, ...)` methods of a module's impl block.
#[proc_macro_attribute]
pub fn hub_methods(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[hub_methods] takes no arguments",
        )
        .to_compile_error()
        .into();
    }
    let item = parse_macro_input!(item as ItemImpl);
    hub_methods::expand(item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Declare an entry hub and the ordered modules attached to it.
///
/// ```ignore
/// #[hubkit::entry_hub(modules(WeatherHub), modules(ChatHub))]
/// pub struct AppHub;
/// ```
#[proc_macro_attribute]
pub fn entry_hub(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = entry_hub::EntryHubArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(&meta));
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as ItemStruct);
    entry_hub::expand(&args, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
