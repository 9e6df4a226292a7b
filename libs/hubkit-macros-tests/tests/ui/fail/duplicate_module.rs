// Attaching the same module twice to one entry hub is rejected.

#[hubkit::entry_hub(modules(ChatHub), modules(ChatHub))]
pub struct AppHub;

fn main() {}
