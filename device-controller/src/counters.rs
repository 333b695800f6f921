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

//! Monotonic per-controller counters. Kept under the same
//! mutex as the rest of the controller's state - one critical section per
//! operation - and handed out by value so callers never hold a reference
//! into controller-internal state.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub total_requests: u64,
    pub total_bytes: u64,
    pub total_latency_ns: u64,
    pub peak_latency_ns: u64,
    pub error_count: u64,
}

impl Counters {
    pub fn record_success(&mut self, bytes: usize, latency: Duration) {
        self.total_requests += 1;
        self.total_bytes += bytes as u64;
        let latency_ns = latency.as_nanos() as u64;
        self.total_latency_ns += latency_ns;
        self.peak_latency_ns = self.peak_latency_ns.max(latency_ns);
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    pub fn to_rpc(self) -> ii_compute_rpc::Metrics {
        ii_compute_rpc::Metrics {
            total_requests: self.total_requests,
            total_bytes: self.total_bytes,
            total_latency_ns: self.total_latency_ns,
            peak_latency_ns: self.peak_latency_ns,
            error_count: self.error_count,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_success_updates_peak_not_just_sum() {
        let mut counters = Counters::default();
        counters.record_success(10, Duration::from_millis(5));
        counters.record_success(10, Duration::from_millis(1));
        assert_eq!(counters.total_requests, 2);
        assert_eq!(counters.peak_latency_ns, Duration::from_millis(5).as_nanos() as u64);
    }
}
