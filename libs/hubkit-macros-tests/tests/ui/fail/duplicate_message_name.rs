// Two methods of one client interface may not send the same message name.

#[hubkit::client_interface]
pub trait ChatClient {
    #[hub(name = "ReceiveMessage")]
    async fn receive_message(&self, text: String) -> Result<(), hubkit::TransportError>;

    #[hub(name = "ReceiveMessage")]
    async fn receive_notice(&self, text: String) -> Result<(), hubkit::TransportError>;
}

fn main() {}
