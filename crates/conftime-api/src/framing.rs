// NETCONF 1.0 end-of-message framing (RFC 6242 §4.3)
//
// Every message on the SSH channel is terminated by the `]]>]]>`
// delimiter. Reads arrive in arbitrary chunks, so incoming bytes are
// buffered until a full delimiter has been seen.

use crate::error::Error;

/// The end-of-message marker.
pub const DELIMITER: &[u8] = b"]]>]]>";

/// Upper bound for a single buffered message. Running configurations
/// of large chassis are a few MiB; anything past this is a runaway peer.
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Append the end-of-message marker to an outgoing XML document.
pub fn encode(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + DELIMITER.len() + 1);
    out.extend_from_slice(message.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(DELIMITER);
    out
}

/// Accumulates channel bytes and yields complete messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Where to resume searching for the delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes read from the channel.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), Error> {
        if self.buf.len() + chunk.len() > MAX_MESSAGE_BYTES {
            return Err(Error::Framing(format!(
                "message exceeds {MAX_MESSAGE_BYTES} bytes without a delimiter"
            )));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete message, if one is buffered.
    ///
    /// The returned text has the delimiter stripped and surrounding
    /// whitespace trimmed.
    pub fn next_message(&mut self) -> Result<Option<String>, Error> {
        let Some(pos) = find(&self.buf[self.scanned..], DELIMITER).map(|p| p + self.scanned) else {
            // A delimiter can straddle two reads, so back off by its length.
            self.scanned = self.buf.len().saturating_sub(DELIMITER.len() - 1);
            return Ok(None);
        };

        let frame: Vec<u8> = self.buf.drain(..pos + DELIMITER.len()).collect();
        self.scanned = 0;

        let text = std::str::from_utf8(&frame[..pos])
            .map_err(|e| Error::Framing(format!("message is not valid UTF-8: {e}")))?;
        Ok(Some(text.trim().to_owned()))
    }

    /// Bytes buffered but not yet part of a complete message.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_appends_delimiter() {
        let bytes = encode("<hello/>");
        assert!(bytes.ends_with(DELIMITER));
        assert!(bytes.starts_with(b"<hello/>"));
    }

    #[test]
    fn single_message_in_one_chunk() {
        let mut dec = FrameDecoder::new();
        dec.extend(b"<rpc-reply><ok/></rpc-reply>]]>]]>").unwrap();
        assert_eq!(
            dec.next_message().unwrap().as_deref(),
            Some("<rpc-reply><ok/></rpc-reply>")
        );
        assert_eq!(dec.next_message().unwrap(), None);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn delimiter_split_across_chunks() {
        let mut dec = FrameDecoder::new();
        dec.extend(b"<hello/>]]>").unwrap();
        assert_eq!(dec.next_message().unwrap(), None);
        dec.extend(b"]]>").unwrap();
        assert_eq!(dec.next_message().unwrap().as_deref(), Some("<hello/>"));
    }

    #[test]
    fn two_messages_in_one_chunk() {
        let mut dec = FrameDecoder::new();
        dec.extend(b"<a/>]]>]]>\n<b/>]]>]]>").unwrap();
        assert_eq!(dec.next_message().unwrap().as_deref(), Some("<a/>"));
        assert_eq!(dec.next_message().unwrap().as_deref(), Some("<b/>"));
        assert_eq!(dec.next_message().unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_a_framing_error() {
        let mut dec = FrameDecoder::new();
        dec.extend(&[0xff, 0xfe]).unwrap();
        dec.extend(DELIMITER).unwrap();
        assert!(matches!(dec.next_message(), Err(Error::Framing(_))));
    }
}
