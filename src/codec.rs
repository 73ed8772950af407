/*! The textual wire format: framing, encryption envelope, compression
envelope, and response parsing.

See the module-level documentation in [`crate::mux`] for how this fits
into the request/response cycle.
*/
use std::io::Read;

use flate2::read::DeflateDecoder;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::Error;
use crate::cipher::Cipher;
use crate::tag::ResponseTag;

/// Characters that must be escaped in a `key=value` query argument.
///
/// `-`, `_`, `.`, and `~` are the usual "unreserved" exceptions; the
/// AniDB UDP API is otherwise happy with strict percent-encoding.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The parsed form of one server datagram (tag already split off).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    /// Three-digit response code.
    pub code: u16,
    /// Remainder of the first line after the code, trimmed.
    pub header: String,
    /// Pipe-separated fields of each subsequent line.
    pub rows: Vec<Vec<String>>,
}

/// Build the plaintext frame for an outbound command: `CMD k=v&k=v&tag=T`.
///
/// `args` is encoded in the order given; the tag is always appended
/// last, matching the reference client's `url.Values.Set("tag", ...)`
/// call order (Go's `url.Values.Encode` happens to sort keys
/// alphabetically, but nothing in the protocol requires that, and
/// this crate keeps caller-supplied order for simplicity).
pub fn encode_frame(cmd: &str, args: &[(&str, String)], tag: &ResponseTag) -> Vec<u8> {
    let mut s = String::new();
    s.push_str(cmd);
    s.push(' ');
    for (i, (k, v)) in args.iter().enumerate() {
        if i > 0 {
            s.push('&');
        }
        s.push_str(k);
        s.push('=');
        s.push_str(&utf8_percent_encode(v, QUERY_ENCODE_SET).to_string());
    }
    if !args.is_empty() {
        s.push('&');
    }
    s.push_str("tag=");
    s.push_str(tag.as_str());
    s.into_bytes()
}

/// Apply the outbound pipeline: encode, then encrypt if a cipher is
/// installed.
pub fn encode_outbound(
    cmd: &str,
    args: &[(&str, String)],
    tag: &ResponseTag,
    cipher: Option<&Cipher>,
) -> Vec<u8> {
    let plain = encode_frame(cmd, args, tag);
    match cipher {
        Some(c) => c.encrypt(&plain),
        None => plain,
    }
}

/// Apply the inbound pipeline to one received datagram: decrypt (if a
/// cipher is installed), then decompress (if the datagram carries the
/// `00 00` DEFLATE prelude).
///
/// Returns the plaintext `TAG CODE HEADER\nrows...` bytes, unparsed.
pub fn decode_inbound(datagram: &[u8], cipher: Option<&Cipher>) -> Result<Vec<u8>, Error> {
    let plain = match cipher {
        Some(c) => c.decrypt(datagram)?,
        None => datagram.to_vec(),
    };
    if plain.len() >= 2 && plain[0] == 0 && plain[1] == 0 {
        let mut decoder = DeflateDecoder::new(&plain[2..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Framing(format!("DEFLATE decompression failed: {e}")))?;
        Ok(out)
    } else {
        Ok(plain)
    }
}

/// Split the leading tag token off a decoded datagram, returning the
/// tag and the remaining payload.
pub fn split_tag(decoded: &[u8]) -> Result<(ResponseTag, &[u8]), Error> {
    let s = decoded;
    let space = s
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::Framing("datagram has no tag".to_string()))?;
    let tag = std::str::from_utf8(&s[..space])
        .map_err(|e| Error::Framing(format!("tag is not valid UTF-8: {e}")))?;
    if tag.is_empty() {
        return Err(Error::Framing("empty tag".to_string()));
    }
    Ok((ResponseTag::new(tag), &s[space + 1..]))
}

/// Parse a payload (tag already removed) into a [`Response`].
///
/// An empty payload (no newline, e.g. the delivered sentinel on
/// close) is accepted by the Mux separately; this function always
/// expects at least a status line.
pub fn parse_response(payload: &[u8]) -> Result<Response, Error> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::Framing(format!("payload is not valid UTF-8: {e}")))?;
    let mut lines = text.split('\n');
    let first = lines.next().unwrap_or("");
    let first = first.strip_suffix('\r').unwrap_or(first);
    if first.len() < 3 || !first.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::Framing(format!(
            "response does not start with a 3-digit code: {first:?}"
        )));
    }
    let code: u16 = first[..3]
        .parse()
        .map_err(|e| Error::Framing(format!("bad response code {:?}: {e}", &first[..3])))?;
    let header = first[3..].trim().to_string();

    let mut rows = Vec::new();
    for line in lines {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        rows.push(line.split('|').map(str::to_string).collect());
    }
    Ok(Response { code, header, rows })
}
