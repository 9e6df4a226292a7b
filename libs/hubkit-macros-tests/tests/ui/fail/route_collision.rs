// `A_B::c` and `A::B_c` both forward as `A_B_c` on the same entry hub.
#![allow(dead_code, non_camel_case_types, non_snake_case)]

#[hubkit::module_hub]
#[derive(Default)]
pub struct A_B {
    state: hubkit::HubState,
}

#[hubkit::hub_methods]
impl A_B {
    pub fn c(&self) -> u32 {
        1
    }
}

#[hubkit::module_hub]
#[derive(Default)]
pub struct A {
    state: hubkit::HubState,
}

#[hubkit::hub_methods]
impl A {
    pub fn B_c(&self) -> u32 {
        2
    }
}

#[hubkit::entry_hub(modules(A_B), modules(A))]
pub struct Entry;

fn main() {}
