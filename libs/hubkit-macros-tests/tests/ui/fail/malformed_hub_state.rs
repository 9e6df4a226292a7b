// A module's `HubState` field must carry a `dyn` client interface.

#[hubkit::module_hub]
pub struct Ticker {
    state: hubkit::HubState<String>,
}

fn main() {}
