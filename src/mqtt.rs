//! Minimal MQTT 3.1.1 framing: CONNECT, SUBSCRIBE (QoS 0), PUBLISH (QoS 0),
//! PINGREQ, DISCONNECT. This is deliberately narrow — just enough framing for
//! the connector to open a session, keep it alive, publish, and receive
//! inbound PUBLISH frames. Per the design's Non-goals, a production MQTT
//! client's retry/QoS/session-resumption machinery is out of scope; this
//! module only builds and parses the byte layout.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82; // type 8, flags 0b0010 (reserved bit required by spec)
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

fn write_remaining_length(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

/// Returns `(remaining_length, bytes_consumed_by_the_length_field)` if a
/// complete variable-length field is present in `buf`, else `None`.
fn read_remaining_length(buf: &[u8]) -> Option<(usize, usize)> {
    let mut multiplier = 1usize;
    let mut value = 0usize;
    let mut index = 0usize;
    loop {
        let byte = *buf.get(index)?;
        value += (byte & 0x7F) as usize * multiplier;
        multiplier *= 128;
        index += 1;
        if byte & 0x80 == 0 {
            return Some((value, index));
        }
        if index > 4 {
            return None;
        }
    }
}

fn write_utf8_str(out: &mut Vec<u8>, s: &str) {
    out.write_u16::<BigEndian>(s.len() as u16).unwrap();
    out.write_all(s.as_bytes()).unwrap();
}

/// Builds a CONNECT packet. The Last Will is always the literal string
/// `"Gone offline"` published (retained = false) on `lastwill/{device_key}`,
/// per §6.
pub fn encode_connect(device_key: &str, device_password: &str, keepalive_secs: u16) -> Vec<u8> {
    let mut variable_and_payload = Vec::new();
    write_utf8_str(&mut variable_and_payload, "MQTT");
    variable_and_payload.push(4); // protocol level 3.1.1

    // Connect flags: username(1) password(1) will-retain(0) will-qos(01) will(1) clean-session(1)
    let flags: u8 = 0b1100_0110;
    variable_and_payload.push(flags);
    variable_and_payload
        .write_u16::<BigEndian>(keepalive_secs)
        .unwrap();

    write_utf8_str(&mut variable_and_payload, device_key); // client id
    let will_topic = format!("lastwill/{device_key}");
    write_utf8_str(&mut variable_and_payload, &will_topic);
    write_utf8_str(&mut variable_and_payload, "Gone offline");
    write_utf8_str(&mut variable_and_payload, device_key); // username
    write_utf8_str(&mut variable_and_payload, device_password); // password

    let mut packet = vec![CONNECT];
    write_remaining_length(&mut packet, variable_and_payload.len());
    packet.extend_from_slice(&variable_and_payload);
    packet
}

/// Builds a PUBLISH packet at QoS 0 (no packet identifier).
pub fn encode_publish(topic: &str, payload: &str) -> Vec<u8> {
    let mut variable_and_payload = Vec::new();
    write_utf8_str(&mut variable_and_payload, topic);
    variable_and_payload.extend_from_slice(payload.as_bytes());

    let mut packet = vec![PUBLISH];
    write_remaining_length(&mut packet, variable_and_payload.len());
    packet.extend_from_slice(&variable_and_payload);
    packet
}

/// Builds a SUBSCRIBE packet at QoS 0 with a fixed packet identifier.
pub fn encode_subscribe(topic: &str, packet_id: u16) -> Vec<u8> {
    let mut variable_and_payload = Vec::new();
    variable_and_payload
        .write_u16::<BigEndian>(packet_id)
        .unwrap();
    write_utf8_str(&mut variable_and_payload, topic);
    variable_and_payload.push(0); // requested QoS 0

    let mut packet = vec![SUBSCRIBE];
    write_remaining_length(&mut packet, variable_and_payload.len());
    packet.extend_from_slice(&variable_and_payload);
    packet
}

pub fn encode_pingreq() -> Vec<u8> {
    vec![PINGREQ, 0x00]
}

pub fn encode_disconnect() -> Vec<u8> {
    vec![DISCONNECT, 0x00]
}

/// A decoded inbound control packet relevant to the connector.
///
/// `payload` is kept as raw bytes rather than `String`: `file_binary_response`
/// carries a binary chunk packet (`[prev_hash | data | curr_hash]`, per §4.3)
/// that is not generally valid UTF-8, so lossy string conversion would
/// corrupt it. Callers that expect JSON convert the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Publish { topic: String, payload: Vec<u8> },
    ConnAck,
    PingResp,
    /// A recognized but uninteresting packet type (SUBACK, etc).
    Other,
}

/// Attempts to decode exactly one complete control packet from the front of
/// `buf`. Returns `(frame, bytes_consumed)` on success, or `None` if `buf`
/// does not yet contain a full packet (the caller should try again after
/// more bytes arrive).
pub fn decode_one(buf: &[u8]) -> Option<(InboundFrame, usize)> {
    let header = *buf.first()?;
    let (remaining_len, len_bytes) = read_remaining_length(&buf[1..])?;
    let total = 1 + len_bytes + remaining_len;
    if buf.len() < total {
        return None;
    }
    let body = &buf[1 + len_bytes..total];
    let packet_type = header & 0xF0;

    let frame = match packet_type {
        t if t == CONNACK & 0xF0 => InboundFrame::ConnAck,
        t if t == PINGRESP & 0xF0 => InboundFrame::PingResp,
        t if t == PUBLISH & 0xF0 => {
            if body.len() < 2 {
                return None;
            }
            let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
            if body.len() < 2 + topic_len {
                return None;
            }
            let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
            let payload = body[2 + topic_len..].to_vec();
            InboundFrame::Publish { topic, payload }
        }
        _ => InboundFrame::Other,
    };

    Some((frame, total))
}
