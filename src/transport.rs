//! Transport adapter (§6): non-blocking send/recv over an externally
//! supplied byte-stream socket, plus the buffering needed to reassemble
//! fragmented MQTT frames out of it.

use crate::mqtt::{self, InboundFrame};
use crate::ConnectorError;

/// The host-supplied byte-stream socket. Implementations may back this with
/// a real TCP/TLS socket, a serial port, or (in tests) an in-memory pipe.
/// `send`/`recv` are expected to be non-blocking: `recv` returns `Ok(0)` when
/// no bytes are currently available rather than blocking for them.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> crate::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> crate::Result<usize>;
}

/// Wraps a [`Transport`] with the receive buffer needed to decode MQTT
/// frames that may arrive split across multiple non-blocking reads.
pub struct TransportAdapter<T: Transport> {
    transport: T,
    recv_buf: Vec<u8>,
    read_scratch: [u8; 1024],
}

impl<T: Transport> TransportAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            recv_buf: Vec::new(),
            read_scratch: [0u8; 1024],
        }
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> crate::Result<usize> {
        self.transport.send(bytes)
    }

    #[cfg(test)]
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Pulls whatever bytes are currently available into the internal
    /// buffer, then attempts to decode at most one complete frame from it.
    /// Returns `Ok(None)` if no full frame is available yet.
    pub fn poll_frame(&mut self) -> crate::Result<Option<InboundFrame>> {
        loop {
            let n = self.transport.recv(&mut self.read_scratch)?;
            if n == 0 {
                break;
            }
            self.recv_buf.extend_from_slice(&self.read_scratch[..n]);
            if n < self.read_scratch.len() {
                break;
            }
        }

        match mqtt::decode_one(&self.recv_buf) {
            Some((frame, consumed)) => {
                self.recv_buf.drain(..consumed);
                Ok(Some(frame))
            }
            None => {
                if self.recv_buf.len() > crate::limits::PAYLOAD_SIZE + crate::limits::TOPIC_SIZE + 16 {
                    // A malformed or adversarial peer could otherwise grow this
                    // buffer unboundedly; nothing recognizable fits in it.
                    return Err(ConnectorError::MalformedFrame);
                }
                Ok(None)
            }
        }
    }
}
