/*
[INPUT]:  Account secret
[OUTPUT]: Signatures for stream control messages
[POS]:    Auth layer - handles stream authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod signer;

pub use signer::{HmacSigner, sign_hex};
