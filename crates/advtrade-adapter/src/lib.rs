/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Advanced Trade stream adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod error;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{HmacSigner, sign_hex};

pub use error::{Result, StreamError};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Credentials,
    MessageRouter,
    ReaderExit,
    ReaderStatus,
    RouteOutcome,
    StreamClient,
    StreamConfig,
};
