pub mod backend;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod gate;
pub mod notify;
pub mod resource;
pub mod secrets;
pub mod session;
pub mod types;

pub use error::{ClientError, RemoteError};
pub use gate::{GateState, Route, RouteGate};
pub use session::{Identity, Session, SessionContext, SessionManager};
