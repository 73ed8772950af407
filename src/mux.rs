/*! The multiplexer: owns the socket, runs the reader thread, and
correlates outbound requests to inbound replies by tag.

Modeled on the same thread-plus-shared-state shape as
[`crate::mtgraph::MTGraph`]'s worker/exit-monitor pair: one background
thread drives the socket, any number of caller threads call
[`Mux::request`] concurrently, and a [`crate::cancel::CancelToken`]
(rather than a full async runtime) lets a caller abandon a wait
promptly.
*/
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};

use crate::Error;
use crate::cancel::CancelToken;
use crate::cipher::Cipher;
use crate::codec::{self, Response};
use crate::registry::ResponseRegistry;
use crate::tag::TagGenerator;

/// How often the reader thread wakes up to check whether it's been
/// asked to stop, and how often an in-flight `request` rechecks its
/// cancellation token. Bounds how long `close`/cancellation take to
/// take effect.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the UDP socket and demultiplexes replies to their waiting
/// caller.
#[derive(Debug)]
pub struct Mux {
    socket: UdpSocket,
    registry: ResponseRegistry,
    tags: TagGenerator,
    cipher: Mutex<Option<Cipher>>,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Mux {
    /// Dial `addr` over UDP and start a Mux on the resulting socket.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Arc<Self>, Error> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(Error::Transport)?;
        socket.connect(addr).map_err(Error::Transport)?;
        Self::new(socket)
    }

    /// Start a Mux on an already-connected datagram socket, spawning
    /// its reader thread.
    pub fn new(socket: UdpSocket) -> Result<Arc<Self>, Error> {
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(Error::Transport)?;
        let mux = Arc::new(Self {
            socket,
            registry: ResponseRegistry::new(),
            tags: TagGenerator::new(),
            cipher: Mutex::new(None),
            closed: AtomicBool::new(false),
            reader: Mutex::new(None),
        });
        let reader_mux = mux.clone();
        let handle = std::thread::Builder::new()
            .name("anidb-mux-reader".to_string())
            .spawn(move || reader_mux.reader_loop())
            .map_err(Error::Transport)?;
        *mux.reader.lock().unwrap() = Some(handle);
        Ok(mux)
    }

    /// The local address the socket is bound to, useful for NAT
    /// detection alongside `PING`'s reflected port.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, Error> {
        self.socket.local_addr().map_err(Error::Transport)
    }

    /// Install (or, with `None`, clear) the cipher used for
    /// subsequent frames in both directions.
    ///
    /// Callers must only do this at a quiescent point (no in-flight
    /// requests that assumed the prior cipher state); the command
    /// layer only calls this from `ENCRYPT`'s success path and from
    /// `LOGOUT`.
    pub fn set_block(&self, cipher: Option<Cipher>) {
        *self.cipher.lock().unwrap() = cipher;
    }

    /// Send `cmd` with `args`, wait for its reply, and parse it.
    ///
    /// Blocks until a reply for this request's tag arrives, `cancel`
    /// is tripped, or the Mux is closed.
    pub fn request(
        &self,
        cancel: &CancelToken,
        cmd: &str,
        args: &[(&str, String)],
    ) -> Result<Response, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let tag = self.tags.next_tag();
        let slot = self.registry.wait_for(tag.clone());

        let cipher = self.cipher.lock().unwrap().clone();
        let frame = codec::encode_outbound(cmd, args, &tag, cipher.as_ref());
        if let Err(e) = self.socket.send(&frame) {
            self.registry.cancel(&tag);
            return Err(Error::Transport(e));
        }

        let bytes = loop {
            match slot.recv_timeout(POLL_INTERVAL) {
                Ok(bytes) => break bytes,
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        self.registry.cancel(&tag);
                        return Err(Error::Transport(std::io::Error::new(
                            std::io::ErrorKind::Interrupted,
                            "request cancelled",
                        )));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::Closed),
            }
        };

        if bytes.is_empty() {
            return Err(Error::Closed);
        }
        codec::parse_response(&bytes)
    }

    /// Close the socket and unblock every outstanding request with a
    /// "closed" error. Idempotent; does not block.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("mux closing");
    }

    fn reader_loop(&self) {
        let mut buf = [0u8; 9000];
        loop {
            match self.socket.recv(&mut buf) {
                Ok(n) => self.process_datagram(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    if self.closed.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("mux reader socket error, shutting down: {e}");
                    break;
                }
            }
        }
        self.closed.store(true, Ordering::SeqCst);
        self.registry.close();
    }

    fn process_datagram(&self, datagram: &[u8]) {
        let cipher = self.cipher.lock().unwrap().clone();
        let decoded = match codec::decode_inbound(datagram, cipher.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                warn!("dropping malformed datagram: {e}");
                return;
            }
        };
        match codec::split_tag(&decoded) {
            Ok((tag, payload)) => self.registry.deliver(&tag, payload.to_vec()),
            Err(e) => warn!("dropping malformed datagram: {e}"),
        }
    }
}
