//! Byte-level message codec and framed send/receive.
//!
//! [`encode`]/[`decode`] are pure byte transformations; [`send`] and
//! [`receive`] move whole packets across a [`Transport`] with
//! write-all / read-until-complete semantics, so a message is either
//! transferred entirely or the call fails. Short reads (including a peer
//! closing mid-message) surface as [`ClientError::Incomplete`]; malformed
//! bytes surface as [`ClientError::Format`] and never panic or read out of
//! bounds.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::transport::Transport;
use crate::types::ClientError;
use super::{Message, HEADER_LEN, TAG_LIST, TAG_PLAIN};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialise a message into a freshly allocated `header || body` packet.
///
/// The body length is computed up front and the buffer allocated once.
/// Fails with [`ClientError::Encode`] if the body does not fit the u32
/// length field.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ClientError> {
    let body_len = match msg {
        Message::Plain(value) => value.len(),
        Message::List(items) => items.iter().map(|item| 4 + item.len()).sum(),
    };
    let len_field = u32::try_from(body_len).map_err(|_| {
        ClientError::Encode(format!(
            "body of {body_len} bytes exceeds the u32 length field"
        ))
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + body_len);
    buf.push(msg.tag());
    buf.extend_from_slice(&len_field.to_be_bytes());
    match msg {
        Message::Plain(value) => buf.extend_from_slice(value.as_bytes()),
        Message::List(items) => {
            for item in items {
                // Cannot overflow: the total body length already fit a u32.
                buf.extend_from_slice(&(item.len() as u32).to_be_bytes());
                buf.extend_from_slice(item.as_bytes());
            }
        }
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parse a message body according to its type tag.
///
/// Fails with [`ClientError::Format`] on an unknown tag, on an element
/// length that runs past the end of the body, on a trailing element length
/// prefix shorter than 4 bytes, or on non-UTF-8 content.
pub fn decode(tag: u8, body: &[u8]) -> Result<Message, ClientError> {
    match tag {
        TAG_PLAIN => {
            let value = std::str::from_utf8(body)
                .map_err(|_| ClientError::Format("plain body is not valid UTF-8".into()))?;
            Ok(Message::Plain(value.to_owned()))
        }
        TAG_LIST => decode_list(body),
        other => Err(ClientError::Format(format!(
            "unknown message tag 0x{other:02x}"
        ))),
    }
}

fn decode_list(body: &[u8]) -> Result<Message, ClientError> {
    let mut items = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(ClientError::Format(format!(
                "incomplete element length prefix: {} trailing byte(s)",
                rest.len()
            )));
        }
        let (prefix, tail) = rest.split_at(4);
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if tail.len() < len {
            return Err(ClientError::Format(format!(
                "element length {len} exceeds the {} byte(s) left in the body",
                tail.len()
            )));
        }
        let (elem, tail) = tail.split_at(len);
        let value = std::str::from_utf8(elem)
            .map_err(|_| ClientError::Format("list element is not valid UTF-8".into()))?;
        items.push(value.to_owned());
        rest = tail;
    }
    Ok(Message::List(items))
}

// ---------------------------------------------------------------------------
// Framed I/O
// ---------------------------------------------------------------------------

/// Encode `msg` and write the whole packet to the transport.
///
/// Partial writes are retried until the packet is fully on the wire; any
/// write error aborts and is surfaced unchanged.
pub async fn send<S>(transport: &mut Transport<S>, msg: &Message) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let packet = encode(msg)?;
    transport.write_all(&packet).await?;
    debug!(
        action = "send_message",
        result = "success",
        kind = msg.kind(),
        bytes = packet.len(),
    );
    Ok(())
}

/// Read exactly one message from the transport.
///
/// Reads the 5 header bytes, then exactly the declared body length, then
/// decodes. A stream that ends mid-header or mid-body fails with
/// [`ClientError::Incomplete`].
pub async fn receive<S>(transport: &mut Transport<S>) -> Result<Message, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    transport.read_full(&mut header).await?;
    let tag = header[0];
    let declared = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    let mut body = vec![0u8; declared];
    transport.read_full(&mut body).await?;

    let msg = decode(tag, &body)?;
    debug!(
        action = "receive_message",
        result = "success",
        kind = msg.kind(),
        bytes = HEADER_LEN + declared,
    );
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
