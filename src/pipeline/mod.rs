//! Pipeline stages for plant analysis.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the network stage can be swapped for a stub.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ request ──▶ llm ──▶ extract
//! (path/URL)  (JPEG)      (payload)   (API)   (record)
//!                                       │
//!                                       └─▶ fallback (config errors only)
//! ```
//!
//! 1. [`input`]    : read a file or decode a data URL into raw bytes
//! 2. [`normalize`]: decode, re-encode as JPEG within the upload budget;
//!    runs in `spawn_blocking`
//! 3. [`request`]  : build the messages payload with the schema instruction
//! 4. [`llm`]      : the only stage with network I/O
//! 5. [`extract`]  : recover and validate the JSON object in the reply
//! 6. [`fallback`] : canned record when the provider is not configured

pub mod extract;
pub mod fallback;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod request;
