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

//! C8+C9: the recursive temporal ensemble. See `scheduler` for the
//! multi-pass consensus loop and `neuron` for the mining-header-based single
//! neuron activation.

pub mod error;
pub mod neuron;
pub mod scheduler;

pub use error::{Error, ErrorKind, Result};
pub use neuron::{forward_batch, MiningNeuron, NeuronWeights};
pub use scheduler::{Consensus, Ensemble, EnsembleScheduler, InferencePass, LayerSeed, NetworkWeights};

#[cfg(test)]
mod integration_test {
    use super::*;
    use core_config::NetworkSizes;
    use device_client::DeviceClient;
    use std::time::Duration;

    /// A small network, five passes, no jitter, seed rotation on - a client
    /// that has never connected to a real server always falls back to
    /// software hashing, so this exercises the whole scheduler loop without
    /// a mock HTTP server.
    #[tokio::test]
    async fn ensemble_with_software_hashing_is_deterministic() {
        let sizes = NetworkSizes {
            input: 10,
            hidden1: 4,
            hidden2: 2,
            output: 2,
        };
        let weights = NetworkWeights::deterministic(sizes, "scenario-2");
        let scheduler = EnsembleScheduler::new(weights, 5, 0.0, true);
        let device = DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_millis(20),
        );
        let input: Vec<u8> = (0..10u8).collect();

        let first = scheduler.infer(&device, &input).await.unwrap();
        assert_eq!(first.valid_passes, 5);
        assert!(first.consensus.plurality_fraction > 0.0 && first.consensus.plurality_fraction <= 1.0);
        assert!(first.consensus.prediction == 0 || first.consensus.prediction == 1);

        let second = scheduler.infer(&device, &input).await.unwrap();
        assert_eq!(first.consensus.prediction, second.consensus.prediction);
        assert_eq!(first.consensus.plurality_fraction, second.consensus.plurality_fraction);
    }

    #[tokio::test]
    async fn infer_rejects_empty_input() {
        let weights = NetworkWeights::deterministic(NetworkSizes::default(), "empty");
        let scheduler = EnsembleScheduler::new(weights, 3, 0.0, false);
        let device = DeviceClient::new(
            reqwest::Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_millis(20),
        );
        let err = scheduler.infer(&device, &[]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadArgument(_)));
    }
}
