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

//! A single sentinel signal used to shut down the Supervisor's background
//! loops (health monitor, log watcher) and any other long-lived task spawned
//! by the Orchestrator. One `Sender` is held by the owner; cloned `Receiver`s
//! are handed to every task that should stop when the owner calls `do_stop`.

use ii_logging::macros::*;

use std::sync::Arc;
use std::time::Duration;

use futures::future::{select, FutureExt};
use tokio::sync::{watch, Mutex};

/// Sender of the halt condition. Cheap to clone; all clones broadcast to the
/// same set of receivers.
#[derive(Clone)]
pub struct Sender {
    inner: Arc<Mutex<watch::Sender<bool>>>,
}

impl Sender {
    /// Broadcast the halt condition and give spawned tasks a short grace
    /// period to observe it and drop.
    pub async fn do_stop(&self) {
        let guard = self.inner.lock().await;
        if guard.send(true).is_err() {
            debug!("halt: no receivers left to notify");
        }
        drop(guard);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Receiver of the halt condition.
#[derive(Clone)]
pub struct Receiver {
    inner: watch::Receiver<bool>,
}

impl Receiver {
    /// Resolves once the halt condition has been broadcast.
    pub async fn wait_for_halt(&mut self) {
        loop {
            if *self.inner.borrow() {
                return;
            }
            if self.inner.changed().await.is_err() {
                error!("halt: sender dropped, nothing will ever stop us - returning anyway");
                return;
            }
        }
    }

    /// True if halt has already been broadcast (non-blocking check).
    pub fn is_halted(&self) -> bool {
        *self.inner.borrow()
    }

    /// Spawn a task that is raced against the halt signal: when halt fires,
    /// the future is dropped at its next await point.
    pub fn spawn<F>(&self, f: F)
    where
        F: std::future::Future<Output = ()> + 'static + Send,
    {
        let mut receiver = self.clone();
        tokio::spawn(async move {
            select(f.boxed(), receiver.wait_for_halt().boxed()).await;
        });
    }
}

/// Create a fresh `(Sender, Receiver)` pair. Additional receivers are made
/// with `Receiver::clone`.
pub fn make_pair() -> (Sender, Receiver) {
    let (tx, rx) = watch::channel(false);
    (
        Sender {
            inner: Arc::new(Mutex::new(tx)),
        },
        Receiver { inner: rx },
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn receiver_observes_halt() {
        let (tx, mut rx) = make_pair();
        assert!(!rx.is_halted());
        tx.do_stop().await;
        rx.wait_for_halt().await;
        assert!(rx.is_halted());
    }

    #[tokio::test]
    async fn spawned_task_is_cancelled_on_halt() {
        let (tx, rx) = make_pair();
        let ran_to_completion = Arc::new(AtomicBool::new(false));
        let flag = ran_to_completion.clone();
        rx.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.do_stop().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ran_to_completion.load(Ordering::SeqCst));
    }
}
