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

//! C8: the recursive-ensemble scheduler. Runs `passes` (default 21)
//! independent forward evaluations of a three-layer network, each under its
//! own input jitter and (optionally) rotated layer seeds, then aggregates the
//! passes' predictions by plurality vote.
//!
//! Per-layer neuron evaluation here is hash-based (one `ComputeBatch` RPC
//! per layer), distinct from the nonce-mining evaluation in
//! `neuron::MiningNeuron` - see DESIGN.md for how the two relate.

use crate::error::{Error, ErrorKind, Result};

use core_config::NetworkSizes;
use device_client::DeviceClient;

use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// One layer's 32-byte seed, standing in for that layer's weights (spec
/// section 4.8 step 2: "seeds are the layer weights").
pub type LayerSeed = [u8; 32];

/// The scheduler's configuration: layer sizes and three layer seeds.
#[derive(Debug, Clone)]
pub struct NetworkWeights {
    pub sizes: NetworkSizes,
    pub seeds: [LayerSeed; 3],
}

impl NetworkWeights {
    /// Deterministic seeds derived from a label, useful for tests and for a
    /// default installation that has not been given real trained weights.
    pub fn deterministic(sizes: NetworkSizes, label: &str) -> Self {
        let base = ii_bitcoin::sha256(label.as_bytes());
        let mut seeds = [[0u8; 32]; 3];
        for (i, seed) in seeds.iter_mut().enumerate() {
            *seed = ii_bitcoin::sha256(&[base.as_slice(), &[i as u8]].concat());
        }
        Self { sizes, seeds }
    }

    fn layer_dims(&self) -> [(usize, usize); 3] {
        [
            (self.sizes.input, self.sizes.hidden1),
            (self.sizes.hidden1, self.sizes.hidden2),
            (self.sizes.hidden2, self.sizes.output),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InferencePass {
    pub pass_index: u32,
    pub prediction: usize,
    pub confidence: f64,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct Consensus {
    pub prediction: usize,
    pub plurality_fraction: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct Ensemble {
    pub passes: Vec<InferencePass>,
    pub consensus: Consensus,
    pub valid_passes: u32,
    pub total_passes: u32,
    pub latency: Duration,
}

pub struct EnsembleScheduler {
    weights: NetworkWeights,
    passes: u32,
    jitter_factor: f64,
    seed_rotation: bool,
}

impl EnsembleScheduler {
    pub fn new(weights: NetworkWeights, passes: u32, jitter_factor: f64, seed_rotation: bool) -> Self {
        Self {
            weights,
            passes,
            jitter_factor,
            seed_rotation,
        }
    }

    /// Runs the full 21-pass (by default) recursive-inference loop (spec
    /// section 4.8).
    pub async fn infer(&self, device: &DeviceClient, input: &[u8]) -> Result<Ensemble> {
        if input.is_empty() {
            return Err(ErrorKind::BadArgument("input must not be empty".to_string()).into());
        }

        let overall_start = Instant::now();
        let input_dim = self.weights.sizes.input;
        let base_input = resize_to(input, input_dim);

        let mut passes = Vec::with_capacity(self.passes as usize);
        for pass_index in 0..self.passes {
            let pass_start = Instant::now();
            match self.run_pass(device, &base_input, pass_index).await {
                Ok((prediction, confidence)) => passes.push(InferencePass {
                    pass_index,
                    prediction,
                    confidence,
                    latency: pass_start.elapsed(),
                }),
                Err(e) => {
                    ii_logging::warn!("ensemble pass {} failed, excluding from consensus: {}", pass_index, e);
                }
            }
        }

        let valid_passes = passes.len() as u32;
        if valid_passes == 0 {
            return Err(ErrorKind::NoValidPasses.into());
        }

        let consensus = Self::consensus(&passes, self.weights.sizes.output);
        Ok(Ensemble {
            passes,
            consensus,
            valid_passes,
            total_passes: self.passes,
            latency: overall_start.elapsed(),
        })
    }

    async fn run_pass(&self, device: &DeviceClient, base_input: &[u8], pass_index: u32) -> Result<(usize, f64)> {
        let jittered = self.jitter(base_input, pass_index);
        let mut layer_input = jittered;

        let mut layer_output = Vec::new();
        for (layer_index, (input_dim, output_dim)) in self.weights.layer_dims().into_iter().enumerate() {
            let seed = self.rotated_seed(layer_index, pass_index);
            let preimages: Vec<Vec<u8>> = (0..output_dim)
.map(|neuron_index| {
                    let mut preimage = Vec::with_capacity(input_dim + 32 + 2);
                    preimage.extend_from_slice(&layer_input);
                    preimage.extend_from_slice(&seed);
                    preimage.extend_from_slice(&(neuron_index as u16).to_le_bytes());
                    preimage
                })
.collect();

            let hashes = device.compute_batch(&preimages, output_dim.max(1)).await?;
            layer_output = hashes.iter().map(activation_from_hash).collect();
            layer_input = layer_output.iter().map(|v| (v * 255.0).round() as u8).collect();
        }

        let prediction = argmax(&layer_output);
        let confidence = layer_output.get(prediction).copied().unwrap_or(0.0);
        Ok((prediction, confidence))
    }

    /// `jittered[i] = clamp(input[i] + u(-j,+j), 0, 255)` with `u` drawn from a
    /// PRNG seeded by the pass index.
    fn jitter(&self, input: &[u8], pass_index: u32) -> Vec<u8> {
        if self.jitter_factor == 0.0 {
            return input.to_vec();
        }
        let j = (self.jitter_factor * 255.0).round() as i32;
        let mut rng = rand_pcg::Pcg32::seed_from_u64(pass_index as u64);
        input
.iter()
.map(|&b| {
                let delta = rng.gen_range(-j..=j);
                (b as i32 + delta).clamp(0, 255) as u8
            })
.collect()
    }

    /// `s'[k] = s[k] XOR byte(pass + k mod 256)`. A
    /// no-op when seed rotation is disabled.
    fn rotated_seed(&self, layer_index: usize, pass_index: u32) -> LayerSeed {
        let mut seed = self.weights.seeds[layer_index];
        if self.seed_rotation {
            for (k, byte) in seed.iter_mut().enumerate() {
                *byte ^= ((pass_index as usize + k) % 256) as u8;
            }
        }
        seed
    }

    /// Plurality vote across passes; ties broken by smallest class label
    ///.
    fn consensus(passes: &[InferencePass], num_classes: usize) -> Consensus {
        let mut counts = vec![0u32; num_classes.max(1)];
        for pass in passes {
            if pass.prediction < counts.len() {
                counts[pass.prediction] += 1;
            }
        }
        let modal_prediction = counts
.iter()
.enumerate()
.max_by(|(a_idx, a_count), (b_idx, b_count)| {
                a_count.cmp(b_count).then(b_idx.cmp(a_idx))
            })
.map(|(idx, _)| idx)
.unwrap_or(0);
        let modal_count = counts.get(modal_prediction).copied().unwrap_or(0);
        let avg_confidence = passes.iter().map(|p| p.confidence).sum::<f64>() / passes.len() as f64;
        Consensus {
            prediction: modal_prediction,
            plurality_fraction: modal_count as f64 / passes.len() as f64,
            avg_confidence,
        }
    }
}

fn resize_to(input: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let copy_len = input.len().min(len);
    out[..copy_len].copy_from_slice(&input[..copy_len]);
    out
}

/// Maps a 32-byte hash to `[0,1]` by taking its first 8 bytes big-endian as a
/// `u64` and dividing by `u64::MAX`.
fn activation_from_hash(hash: &[u8; 32]) -> f64 {
    let n = u64::from_be_bytes(hash[0..8].try_into().expect("8 bytes"));
    n as f64 / u64::MAX as f64
}

fn argmax(values: &[f64]) -> usize {
    values
.iter()
.enumerate()
.max_by(|(a_idx, a), (b_idx, b)| a.partial_cmp(b).unwrap().then(b_idx.cmp(a_idx)))
.map(|(idx, _)| idx)
.unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn jitter_is_identity_when_factor_is_zero() {
        let weights = NetworkWeights::deterministic(
            NetworkSizes {
                input: 4,
                hidden1: 4,
                hidden2: 4,
                output: 2,
            },
            "test",
        );
        let scheduler = EnsembleScheduler::new(weights, 1, 0.0, false);
        let input = [1u8, 2, 3, 4];
        assert_eq!(scheduler.jitter(&input, 0), input.to_vec());
    }

    #[test]
    fn rotated_seed_is_identity_when_rotation_disabled() {
        let weights = NetworkWeights::deterministic(NetworkSizes::default(), "test");
        let scheduler = EnsembleScheduler::new(weights.clone(), 1, 0.0, false);
        assert_eq!(scheduler.rotated_seed(0, 5), weights.seeds[0]);
    }

    #[test]
    fn rotated_seed_changes_with_pass_when_enabled() {
        let weights = NetworkWeights::deterministic(NetworkSizes::default(), "test");
        let scheduler = EnsembleScheduler::new(weights, 1, 0.0, true);
        let seed_pass_0 = scheduler.rotated_seed(0, 0);
        let seed_pass_1 = scheduler.rotated_seed(0, 1);
        assert_ne!(seed_pass_0, seed_pass_1);
    }

    #[test]
    fn activation_from_hash_of_zero_is_zero() {
        assert_eq!(activation_from_hash(&[0u8; 32]), 0.0);
    }

    #[test]
    fn activation_from_hash_of_max_is_one() {
        assert_eq!(activation_from_hash(&[0xffu8; 32]), 1.0);
    }

    #[test]
    fn consensus_breaks_ties_toward_smallest_label() {
        let passes = vec![
            InferencePass {
                pass_index: 0,
                prediction: 3,
                confidence: 0.5,
                latency: Duration::from_millis(1),
            },
            InferencePass {
                pass_index: 1,
                prediction: 1,
                confidence: 0.9,
                latency: Duration::from_millis(1),
            },
        ];
        let consensus = EnsembleScheduler::consensus(&passes, 10);
        assert_eq!(consensus.prediction, 1);
        assert_eq!(consensus.plurality_fraction, 0.5);
    }

    #[test]
    fn resize_to_pads_with_zero_and_truncates() {
        assert_eq!(resize_to(&[1, 2, 3], 5), vec![1, 2, 3, 0, 0]);
        assert_eq!(resize_to(&[1, 2, 3, 4, 5], 3), vec![1, 2, 3]);
    }
}
