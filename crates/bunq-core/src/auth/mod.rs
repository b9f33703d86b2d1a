/*
[INPUT]:  API key, device settings and the client key pair
[OUTPUT]: Installed identity, active session and persisted contexts
[POS]:    Auth layer - handles the bunq handshake and session lifecycle
[UPDATE]: When handshake flow, session storage or context format change
*/

pub mod context;
pub mod key_pair;
pub mod manager;
pub mod session;

pub use context::{ClientContext, create_context, load_context, read_context, save_context};
pub use key_pair::{KeyPair, ServerPublicKey};
pub use manager::SessionManager;
pub use session::{SessionData, SessionStore};
