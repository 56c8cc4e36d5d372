//! Packet validator (§4.3). Every file-chunk packet is framed as
//! `[prev_hash | data | curr_hash]`, each hash field exactly [`HASH_SIZE`]
//! bytes, `curr_hash = SHA256(data)`.

use crate::limits::HASH_SIZE;
use sha2::{Digest, Sha256};

/// `packet_size > 2 * HASH_SIZE` and `curr_hash == SHA256(data)`.
pub fn is_valid(packet: &[u8]) -> bool {
    if packet.len() <= 2 * HASH_SIZE {
        return false;
    }
    let claimed = get_current_hash(packet);
    let computed = Sha256::digest(get_data(packet));
    claimed == computed.as_slice()
}

pub fn get_previous_hash(packet: &[u8]) -> &[u8] {
    &packet[0..HASH_SIZE]
}

pub fn get_data(packet: &[u8]) -> &[u8] {
    &packet[HASH_SIZE..packet.len() - HASH_SIZE]
}

pub fn get_current_hash(packet: &[u8]) -> &[u8] {
    &packet[packet.len() - HASH_SIZE..]
}

/// Build a framed packet `[prev_hash | data | SHA256(data)]`. Used by tests
/// and by the reference file-download backend to emulate a platform-supplied
/// chunk stream.
pub fn build(prev_hash: &[u8; HASH_SIZE], data: &[u8]) -> Vec<u8> {
    let curr = Sha256::digest(data);
    let mut packet = Vec::with_capacity(2 * HASH_SIZE + data.len());
    packet.extend_from_slice(prev_hash);
    packet.extend_from_slice(data);
    packet.extend_from_slice(&curr);
    packet
}
