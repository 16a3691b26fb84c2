mod callee;
mod caller;
mod cleanup;
mod client;
mod publisher;
mod session;
mod subscriber;
mod web_socket_peer;

pub use callee::{
    Callee,
    Invocation,
    Registration,
    Responder,
};
pub use caller::Caller;
pub use client::Client;
pub use publisher::Publisher;
pub use session::{
    Session,
    SessionConfig,
    SessionState,
    WeakSession,
};
pub use subscriber::{
    Subscriber,
    Subscription,
};
pub use web_socket_peer::new_web_socket_client;
