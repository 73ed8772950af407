/*! The typed command layer: `AUTH`, `LOGOUT`, `ENCRYPT`, `PING`,
`UPTIME`, and `FILE`.

Each method builds the command's argument list, waits for a rate
limiter token, sends the request through the [`Mux`], and dispatches
on the response code. Grounded directly on the reference client's
`Auth`/`Logout`/`Encrypt`/`Ping`/`Uptime`/`FileByHash` methods.
*/
use std::sync::Arc;

use log::warn;
use md5::{Digest, Md5};

use crate::Error;
use crate::cancel::{self, CancelToken};
use crate::cipher::Cipher;
use crate::config::AniDbConfig;
use crate::file::File;
use crate::limiter::RateLimiter;
use crate::mask::{FileAmask, FileFmask};
use crate::mux::Mux;
use crate::session::SessionState;

/// What `AUTH` returns: the external port the server observed (useful
/// for NAT detection), and the response code that delivered it (200
/// vs. the still-accepted 201 "new version available").
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthInfo {
    /// The caller's external port as observed by the server.
    pub external_port: String,
    /// `true` if the server signalled a newer client version exists.
    /// The API call still succeeds; callers may want to log this.
    pub new_version_available: bool,
}

/// An AniDB UDP API client: session lifecycle and the six recognized
/// commands, layered over a [`Mux`].
#[derive(Debug)]
pub struct Client {
    mux: Arc<Mux>,
    limiter: RateLimiter,
    session: SessionState,
    config: AniDbConfig,
}

impl Client {
    /// Dial the server named in `config.address`. Does not authenticate.
    pub fn connect(config: AniDbConfig) -> Result<Self, Error> {
        let mux = Mux::connect(&config.address)?;
        Ok(Self {
            mux,
            limiter: RateLimiter::new(),
            session: SessionState::new(),
            config,
        })
    }

    /// Dial and immediately `AUTH`, the common case.
    ///
    /// On failure, the partially-constructed Mux is closed before the
    /// error is returned.
    pub fn connect_authenticated(
        config: AniDbConfig,
        cancel: &CancelToken,
    ) -> Result<(Self, AuthInfo), Error> {
        let client = Self::connect(config)?;
        match client.auth(cancel) {
            Ok(info) => Ok((client, info)),
            Err(e) => {
                client.mux.close();
                Err(e)
            }
        }
    }

    /// Best-effort `LOGOUT` (failures are logged, not propagated),
    /// followed unconditionally by closing the underlying Mux.
    pub fn teardown(&self, cancel: &CancelToken) {
        if let Err(e) = self.logout(cancel) {
            warn!("logout during teardown failed: {e}");
        }
        self.mux.close();
    }

    /// The local port the client's socket is bound to.
    pub fn local_port(&self) -> Result<u16, Error> {
        Ok(self.mux.local_addr()?.port())
    }

    fn send(&self, cancel: &CancelToken, cmd: &str, args: &[(&str, String)]) -> Result<crate::codec::Response, Error> {
        self.limiter.wait(cancel)?;
        self.mux.request(cancel, cmd, args)
    }

    fn session_args(&self) -> Result<Vec<(&'static str, String)>, Error> {
        let key = self
            .session
            .session_key()
            .ok_or_else(|| Error::State("no session key (call auth first)".to_string()))?;
        Ok(vec![("s", key)])
    }

    /// `AUTH`: log in and receive a session key.
    pub fn auth(&self, cancel: &CancelToken) -> Result<AuthInfo, Error> {
        let args = [
            ("user", self.config.user.clone()),
            ("pass", self.config.password.clone()),
            ("protover", "3".to_string()),
            ("client", self.config.client_name.clone()),
            ("clientver", self.config.client_version.to_string()),
            ("nat", "1".to_string()),
            ("comp", "1".to_string()),
        ];
        let resp = self.send(cancel, "AUTH", &args)?;
        match resp.code {
            200 | 201 => {
                let parts: Vec<&str> = resp.header.splitn(3, ' ').collect();
                if parts.len() < 3 {
                    return Err(Error::Protocol {
                        code: resp.code,
                        header: resp.header,
                    });
                }
                self.session.set_session_key(parts[0].to_string());
                Ok(AuthInfo {
                    external_port: parts[1].to_string(),
                    new_version_available: resp.code == 201,
                })
            }
            other => Err(Error::Protocol {
                code: other,
                header: resp.header,
            }),
        }
    }

    /// `LOGOUT`: clears the local session key and cipher once the
    /// server has actually responded, regardless of which response
    /// code it sent. If the request itself never completed (transport
    /// failure, cancellation, or an already-closed Mux), local state is
    /// left untouched so a retry can still use the session key.
    pub fn logout(&self, cancel: &CancelToken) -> Result<(), Error> {
        let args = self.session_args()?;
        let resp = self.send(cancel, "LOGOUT", &args)?;
        self.mux.set_block(None);
        self.session.clear();
        match resp.code {
            203 => Ok(()),
            other => Err(Error::Protocol {
                code: other,
                header: resp.header,
            }),
        }
    }

    /// `ENCRYPT`: derive an AES-128 session cipher from the
    /// configured API key and the server-provided salt, and install
    /// it on the Mux.
    pub fn encrypt(&self, cancel: &CancelToken) -> Result<(), Error> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::State("api_key is required to use ENCRYPT".to_string()))?;
        let args = [
            ("user", self.config.user.clone()),
            ("type", "1".to_string()),
        ];
        let resp = self.send(cancel, "ENCRYPT", &args)?;
        match resp.code {
            209 => {
                let salt = resp.header.split(' ').next().unwrap_or_default();
                let mut hasher = Md5::new();
                hasher.update(api_key.as_bytes());
                hasher.update(salt.as_bytes());
                let digest = hasher.finalize();
                let mut key = [0u8; 16];
                key.copy_from_slice(&digest);
                self.mux.set_block(Some(Cipher::new(key)));
                Ok(())
            }
            other => Err(Error::Protocol {
                code: other,
                header: resp.header,
            }),
        }
    }

    /// `PING`: returns the external port the server observed.
    pub fn ping(&self, cancel: &CancelToken, nat: bool) -> Result<String, Error> {
        let args = [("nat", if nat { "1" } else { "0" }.to_string())];
        let resp = self.send(cancel, "PING", &args)?;
        if resp.code != 300 {
            return Err(Error::Protocol {
                code: resp.code,
                header: resp.header,
            });
        }
        one_field(&resp, "PING")
    }

    /// `UPTIME`: server uptime in milliseconds.
    pub fn uptime(&self, cancel: &CancelToken) -> Result<u64, Error> {
        let args = self.session_args()?;
        let resp = self.send(cancel, "UPTIME", &args)?;
        if resp.code != 208 {
            return Err(Error::Protocol {
                code: resp.code,
                header: resp.header,
            });
        }
        let field = one_field(&resp, "UPTIME")?;
        field.parse().map_err(|e| Error::Protocol {
            code: resp.code,
            header: format!("uptime field {field:?} is not a valid integer: {e}"),
        })
    }

    /// `FILE` by (size, ed2k): the core's default 26-field query.
    pub fn file_by_hash(&self, cancel: &CancelToken, size: u64, ed2k: &str) -> Result<File, Error> {
        let fmask = FileFmask::default_request();
        let amask = FileAmask::default_request();
        let mut args = self.session_args()?;
        args.push(("size", size.to_string()));
        args.push(("ed2k", ed2k.to_string()));
        args.push(("fmask", fmask.to_hex()));
        args.push(("amask", amask.to_hex()));
        let resp = self.send(cancel, "FILE", &args)?;
        if resp.code != 220 {
            return Err(Error::Protocol {
                code: resp.code,
                header: resp.header,
            });
        }
        if resp.rows.len() != 1 {
            return Err(Error::Protocol {
                code: resp.code,
                header: format!("FILE returned {} rows, expected 1", resp.rows.len()),
            });
        }
        File::from_row(&resp.rows[0], fmask, amask)
    }
}

fn one_field(resp: &crate::codec::Response, cmd: &str) -> Result<String, Error> {
    if resp.rows.len() != 1 {
        return Err(Error::Protocol {
            code: resp.code,
            header: format!("{cmd} returned {} rows, expected 1", resp.rows.len()),
        });
    }
    if resp.rows[0].len() != 1 {
        return Err(Error::Protocol {
            code: resp.code,
            header: format!("{cmd} row has {} fields, expected 1", resp.rows[0].len()),
        });
    }
    Ok(resp.rows[0][0].clone())
}

/// A token that never cancels, for callers that don't need to abort
/// in-flight commands.
pub fn no_cancel() -> CancelToken {
    cancel::never()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Response;

    #[test]
    fn one_field_rejects_wrong_row_count() {
        let resp = Response {
            code: 300,
            header: "PONG".to_string(),
            rows: vec![],
        };
        assert!(one_field(&resp, "PING").is_err());
    }

    #[test]
    fn one_field_rejects_wrong_field_count() {
        let resp = Response {
            code: 300,
            header: "PONG".to_string(),
            rows: vec![vec!["a".to_string(), "b".to_string()]],
        };
        assert!(one_field(&resp, "PING").is_err());
    }

    #[test]
    fn one_field_extracts_single_value() {
        let resp = Response {
            code: 300,
            header: "PONG".to_string(),
            rows: vec![vec!["12345".to_string()]],
        };
        assert_eq!(one_field(&resp, "PING").unwrap(), "12345");
    }
}
