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

//! C9: turns a vector of projections into an 80-byte mining header and reads
//! back an ASIC-found nonce as the neuron's activation.
//!
//! This is a standalone component, separate from the ensemble scheduler's own
//! hash-based layer evaluation (see `scheduler.rs` and DESIGN.md for how the
//! two relate). `MiningNeuron` is exercised directly by callers (and tests)
//! that want a single neuron's nonce-derived activation rather than the
//! scheduler's batched hash path.

use crate::error::{Error, ErrorKind, Result};

use device_client::DeviceClient;
use futures::future::join_all;

/// `projections` needs at least 16 entries: 8 become the header's
/// `prev_hash`, the next 8 its `merkle_root`.
const MIN_PROJECTIONS: usize = 16;

/// One neuron's weight matrix (`output_dim x input_dim`) and bias vector.
#[derive(Debug, Clone)]
pub struct NeuronWeights {
    pub input_dim: usize,
    pub output_dim: usize,
    /// Row-major: `weights[o * input_dim + i]`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl NeuronWeights {
    pub fn new(input_dim: usize, output_dim: usize, weights: Vec<f32>, bias: Vec<f32>) -> Self {
        assert_eq!(weights.len(), input_dim * output_dim);
        assert_eq!(bias.len(), output_dim);
        Self {
            input_dim,
            output_dim,
            weights,
            bias,
        }
    }

    /// `projections = weights. input + bias`.
    fn project(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_dim {
            return Err(ErrorKind::BadArgument(format!(
                "input length {} does not match input_dim {}",
                input.len(),
                self.input_dim
            ))
.into());
        }
        if self.output_dim < MIN_PROJECTIONS {
            return Err(ErrorKind::BadArgument(format!(
                "output_dim {} is below the {} projections a header needs",
                self.output_dim, MIN_PROJECTIONS
            ))
.into());
        }
        let mut projections = self.bias.clone();
        for o in 0..self.output_dim {
            let row = &self.weights[o * self.input_dim..(o + 1) * self.input_dim];
            projections[o] += row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>();
        }
        Ok(projections)
    }
}

/// Builds the 80-byte header from 16 of a neuron's projections:
/// `version`/`timestamp` both carry `salt`, `prev_hash` is the first 8
/// projections' little-endian f32 bits, `merkle_root` the next 8, `nBits` is
/// Difficulty-1 (`0x1d00ffff`), `nonce` starts at `nonce_start`.
fn build_header(projections: &[f32], salt: u32, nonce_start: u32) -> [u8; 80] {
    let mut prev_hash = [0u8; 32];
    for (i, p) in projections[0..8].iter().enumerate() {
        prev_hash[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
    }
    let mut merkle_root = [0u8; 32];
    for (i, p) in projections[8..16].iter().enumerate() {
        merkle_root[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
    }
    ii_bitcoin::Header::build(
        salt.to_le_bytes(),
        prev_hash,
        merkle_root,
        salt.to_le_bytes(),
        ii_bitcoin::DIFFICULTY_ONE_N_BITS.to_le_bytes(),
        nonce_start.to_le_bytes(),
    )
.as_bytes()
.to_owned()
}

/// One mining neuron: a weight matrix plus the device client it mines
/// through.
pub struct MiningNeuron<'a> {
    pub weights: NeuronWeights,
    pub device: &'a DeviceClient,
}

impl<'a> MiningNeuron<'a> {
    pub fn new(weights: NeuronWeights, device: &'a DeviceClient) -> Self {
        Self { weights, device }
    }

    /// Returns the raw 32-bit nonce; callers normalize by dividing by
    /// `u32::MAX` downstream.
    pub async fn forward(&self, input: &[f32], salt: u32, nonce_start: u32, nonce_end: u32) -> Result<u32> {
        let projections = self.weights.project(input)?;
        let header = build_header(&projections, salt, nonce_start);
        let nonce = self.device.mine_header(&header, nonce_start, nonce_end).await?;
        Ok(nonce)
    }
}

/// Runs `forward` for each `(weights, input)` pair in parallel; the first
/// error wins.
pub async fn forward_batch(
    device: &DeviceClient,
    items: &[(NeuronWeights, Vec<f32>)],
    salt: u32,
    nonce_start: u32,
    nonce_end: u32,
) -> Result<Vec<u32>> {
    let futures = items.iter().map(|(weights, input)| async move {
        let neuron = MiningNeuron::new(weights.clone(), device);
        neuron.forward(input, salt, nonce_start, nonce_end).await
    });
    let results = join_all(futures).await;
    results.into_iter().collect::<Result<Vec<u32>>>()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn project_requires_matching_input_length() {
        let weights = NeuronWeights::new(4, 16, vec![0.0; 64], vec![0.0; 16]);
        let err = weights.project(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }

    #[test]
    fn project_requires_at_least_16_outputs() {
        let weights = NeuronWeights::new(2, 4, vec![0.0; 8], vec![0.0; 4]);
        let err = weights.project(&[1.0, 1.0]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }

    #[test]
    fn build_header_places_salt_in_version_and_timestamp() {
        let projections = vec![0.0f32; 16];
        let header = build_header(&projections, 0xDEAD_BEEF, 0);
        assert_eq!(&header[0..4], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&header[68..72], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&header[72..76], &ii_bitcoin::DIFFICULTY_ONE_N_BITS.to_le_bytes());
    }

    #[test]
    fn projection_matches_manual_dot_product() {
        let weights = NeuronWeights::new(
            2,
            16,
            {
                let mut w = vec![0.0f32; 32];
                w[0] = 1.0; // output 0 reads input[0]
                w[1] = 2.0; // output 0 reads input[1]
                w
            },
            vec![0.5f32; 16],
        );
        let projections = weights.project(&[3.0, 4.0]).unwrap();
        assert_eq!(projections[0], 3.0 * 1.0 + 4.0 * 2.0 + 0.5);
    }
}
