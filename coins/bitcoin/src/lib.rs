// Copyright (C) 2026  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! Header, midstate and target helpers shared by the wire protocol, the device
//! controller and the mining neuron.
//!
//! Terminology follows the 80-byte Bitcoin-style block header even though the
//! "activation" path (see `ensemble` crate) never submits these headers anywhere -
//! it only uses them as a deterministic vehicle to get a nonce out of an ASIC.

use sha2::{Digest, Sha256};

pub const HEADER_SIZE: usize = 80;
pub const SHA256_DIGEST_SIZE: usize = 32;
pub const MIDSTATE_SIZE: usize = 32;

/// `Midstate` - as defined for this system - is SHA-256 of the first 64 bytes of an
/// 80-byte header. This is a deliberate simplification of the real Bitcoin mining
/// midstate (the raw SHA-256 compression state words); see DESIGN.md for the
/// rationale. It lets the ASIC re-hash only the 16-byte tail while iterating nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Midstate(pub [u8; MIDSTATE_SIZE]);

impl Midstate {
    pub fn from_header_prefix(header: &[u8; HEADER_SIZE]) -> Self {
        let digest = Sha256::digest(&header[0..64]);
        let mut out = [0u8; MIDSTATE_SIZE];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; MIDSTATE_SIZE] {
        &self.0
    }
}

/// A full 80-byte mining header: `version(4) || prev_hash(32) || merkle(32) ||
/// timestamp(4) || nBits(4) || nonce(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header(pub [u8; HEADER_SIZE]);

impl Header {
    pub fn build(
        version: [u8; 4],
        prev_hash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: [u8; 4],
        n_bits: [u8; 4],
        nonce: [u8; 4],
    ) -> Self {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&version);
        bytes[4..36].copy_from_slice(&prev_hash);
        bytes[36..68].copy_from_slice(&merkle_root);
        bytes[68..72].copy_from_slice(&timestamp);
        bytes[72..76].copy_from_slice(&n_bits);
        bytes[76..80].copy_from_slice(&nonce);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn with_nonce(&self, nonce: u32) -> Self {
        let mut bytes = self.0;
        bytes[76..80].copy_from_slice(&nonce.to_le_bytes());
        Self(bytes)
    }

    pub fn nonce(&self) -> u32 {
        u32::from_le_bytes(self.0[76..80].try_into().expect("header is 80 bytes"))
    }

    pub fn n_bits(&self) -> u32 {
        u32::from_le_bytes(self.0[72..76].try_into().expect("header is 80 bytes"))
    }

    /// Bytes 64..76: merkle suffix, timestamp and nBits - what gets sent as the
    /// wire `tail` alongside a midstate (the nonce itself, bytes 76..80, is never
    /// transmitted to the ASIC).
    pub fn tail(&self) -> [u8; 12] {
        self.0[64..76].try_into().expect("header is 80 bytes")
    }

    pub fn midstate(&self) -> Midstate {
        Midstate::from_header_prefix(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.0
    }
}

/// Double SHA-256, as used both for the mining hash-of-hash and for the
/// synthesized "activation" hash on the ensemble's compute path.
pub fn double_sha256(data: &[u8]) -> [u8; SHA256_DIGEST_SIZE] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut out = [0u8; SHA256_DIGEST_SIZE];
    out.copy_from_slice(&second);
    out
}

pub fn sha256(data: &[u8]) -> [u8; SHA256_DIGEST_SIZE] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; SHA256_DIGEST_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// "Difficulty-1" Bitcoin mainnet target.
pub const DIFFICULTY_ONE_N_BITS: u32 = 0x1d00ffff;

/// `EasyTarget` - a deliberately loose mining target so a satisfying nonce
/// is found almost instantly, used by the activation path and in tests.
pub const EASY_TARGET_N_BITS: u32 = 0x207fffff;

/// A 256-bit mining target expanded from Bitcoin's compact ("nBits") representation:
/// `target = mantissa * 256^(exponent - 3)`, stored big-endian (MSB first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target([u8; 32]);

impl Target {
    pub fn from_compact(n_bits: u32) -> Self {
        let exponent = (n_bits >> 24) as usize;
        let mantissa = n_bits & 0x00ff_ffff;
        let mut bytes = [0u8; 32];

        if exponent <= 3 {
            // mantissa is right-shifted, fits entirely within the low bytes
            let shift = 3 - exponent;
            let mantissa = mantissa >> (8 * shift);
            bytes[29..32].copy_from_slice(&mantissa.to_be_bytes()[1..4]);
        } else {
            let shift = exponent - 3;
            if shift <= 29 {
                let start = 29 - shift;
                bytes[start..start + 3].copy_from_slice(&mantissa.to_be_bytes()[1..4]);
            }
            // if shift > 29 the target overflows 256 bits; treat as maximal (all 0xff)
            if shift > 29 {
                bytes = [0xffu8; 32];
            }
        }
        Self(bytes)
    }

    pub fn easy() -> Self {
        Self::from_compact(EASY_TARGET_N_BITS)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// A hash (as returned by `double_sha256`, i.e. in wire/little-endian byte
    /// order) satisfies the target if, interpreted as a big-endian 256-bit
    /// integer, it does not exceed it.
    pub fn is_satisfied_by(&self, hash: &[u8; 32]) -> bool {
        let mut be = *hash;
        be.reverse();
        be <= self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn midstate_matches_sha256_of_header_prefix() {
        let header = Header::from_bytes([0xAA; HEADER_SIZE]);
        let midstate = header.midstate();
        let expected = sha256(&header.as_bytes()[0..64]);
        assert_eq!(midstate.0, expected);
    }

    #[test]
    fn tail_is_bytes_64_to_76() {
        let mut raw = [0u8; HEADER_SIZE];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = i as u8;
        }
        let header = Header::from_bytes(raw);
        assert_eq!(header.tail(), raw[64..76]);
    }

    #[test]
    fn with_nonce_roundtrips() {
        let header = Header::from_bytes([0u8; HEADER_SIZE]).with_nonce(0x41424344);
        assert_eq!(header.nonce(), 0x41424344);
    }

    #[test]
    fn easy_target_is_far_looser_than_difficulty_one() {
        let easy = Target::easy();
        let diff1 = Target::from_compact(DIFFICULTY_ONE_N_BITS);
        // easy target's byte representation is numerically much larger (looser)
        assert!(easy.as_bytes() > diff1.as_bytes());
    }

    #[test]
    fn target_accepts_hash_of_all_zero_bytes() {
        let target = Target::easy();
        assert!(target.is_satisfied_by(&[0u8; 32]));
    }

    #[test]
    fn target_rejects_hash_of_all_ff_bytes() {
        let target = Target::from_compact(DIFFICULTY_ONE_N_BITS);
        assert!(!target.is_satisfied_by(&[0xffu8; 32]));
    }
}
