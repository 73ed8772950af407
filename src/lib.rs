#![warn(missing_docs)]
/*! A client runtime for the AniDB UDP API.

The UDP API is a datagram request/response protocol: the client sends
a short textual command tagged with a client-chosen token, and the
server replies (on the same tag) some time later, possibly out of
order relative to other in-flight requests. Replies may be DEFLATE
compressed, and once a session has called `ENCRYPT`, every datagram in
both directions is wrapped in AES-128-ECB.

[`mux::Mux`] owns the socket and the reader thread that demultiplexes
replies back to their waiting caller by tag. [`client::Client`] sits on
top and knows the individual commands (`AUTH`, `LOGOUT`, `PING`, ...).
Everything below that is plumbing: [`tag`] allocates request tags,
[`registry`] matches a tag to the thread waiting on it, [`limiter`]
throttles outbound commands to the rates the server tolerates, and
[`codec`]/[`cipher`] implement the wire format itself.

# Example

```no_run
use anidb::cancel::CancelToken;
use anidb::{AniDbConfig, Client};

let cfg = AniDbConfig {
    user: "someuser".to_string(),
    password: "somepass".to_string(),
    ..Default::default()
};
let cancel = CancelToken::new();
let client = Client::connect(cfg)?;
client.auth(&cancel)?;
let _port = client.ping(&cancel, true)?;
client.teardown(&cancel);
# Ok::<(), anidb::Error>(())
```
*/
pub mod cancel;
pub mod cipher;
pub mod client;
pub mod codec;
pub mod config;
pub mod file;
pub mod limiter;
pub mod mask;
pub mod mux;
pub mod registry;
pub mod session;
pub mod tag;

pub use client::Client;
pub use config::AniDbConfig;
pub use mux::Mux;

/// Errors produced anywhere in this crate.
///
/// Callers that need to distinguish failure modes match on the
/// variant; everything else can just propagate it with `?`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying socket failed, or the caller's own
    /// [`crate::cancel::CancelToken`] fired while waiting for a rate
    /// limiter token or a reply.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A datagram could not be decrypted, decompressed, or parsed
    /// into the `TAG CODE HEADER` shape the protocol requires.
    #[error("framing error: {0}")]
    Framing(String),

    /// The server replied with a response code the caller's command
    /// doesn't know how to handle, or one signalling a protocol-level
    /// failure (e.g. `501 LOGIN FIRST`).
    #[error("protocol error: code {code} {header}")]
    Protocol {
        /// The three-digit response code.
        code: u16,
        /// The header text that followed the code.
        header: String,
    },

    /// The call was made in a session state that doesn't allow it
    /// (e.g. a command that requires `AUTH` sent before logging in).
    #[error("invalid state: {0}")]
    State(String),

    /// The request was issued against an already-closed Mux, or the
    /// Mux was closed while the request was still in flight.
    #[error("closed")]
    Closed,
}
