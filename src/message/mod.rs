//! Wire framing: length-prefixed tagged messages on a buffered duplex byte
//! stream.
//!
//! A backend message is `tag:u8, length:i32 (includes itself), body`. The
//! startup message and `SSLRequest` are the two tagless exceptions and are
//! encoded directly by [`frontend::Startup`]/[`frontend::SSLRequest`].
//! Reader contract: read exactly 5 bytes for `(tag, length)`, then
//! `length - 4` more bytes of payload. Writer contract: push tag + length +
//! body into the session's write buffer; the actual socket write happens
//! once per client operation, in [`crate::session::Session::flush`].
use bytes::{Buf, Bytes};
use std::io::{self, Read};

pub mod backend;
pub mod frontend;

pub use backend::{BackendMessage, BackendProtocol};
pub use frontend::FrontendProtocol;

/// Push `tag` (omitted for the startup/SSLRequest exceptions) + a
/// self-computed length + whatever `body` writes, onto `buf`.
pub(crate) fn write_framed(buf: &mut Vec<u8>, tag: Option<u8>, body: impl FnOnce(&mut Vec<u8>)) {
    if let Some(tag) = tag {
        buf.push(tag);
    }
    let len_at = buf.len();
    buf.extend_from_slice(&[0; 4]);
    body(buf);
    let len = (buf.len() - len_at) as u32;
    buf[len_at..len_at + 4].copy_from_slice(&len.to_be_bytes());
}

/// Block until one full backend message has been read off `stream`,
/// returning its tag and body (the length prefix itself is consumed, not
/// included in `body`).
pub(crate) fn read_message<R: Read>(stream: &mut R) -> io::Result<(u8, Bytes)> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header)?;
    let tag = header[0];
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut body = vec![0u8; len.saturating_sub(4)];
    stream.read_exact(&mut body)?;
    Ok((tag, Bytes::from(body)))
}

/// Read a nul-terminated string out of `buf`, advancing past the nul.
pub(crate) fn get_nul_string(buf: &mut Bytes) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let s = buf.split_to(end);
    if !buf.is_empty() {
        buf.advance(1);
    }
    String::from_utf8_lossy(&s).into_owned()
}
