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

//! A deterministic, in-memory `Transport` used by the Device Controller's
//! own test suite and by any crate that wants to exercise C3 without real
//! hardware. Frames sent by the caller are recorded in arrival order;
//! responses are handed back from a pre-loaded script.

use crate::{Transport, TransportError, TransportErrorKind, TransportKind};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum ScriptedReply {
    Frame(Vec<u8>),
    Error(TransportErrorKind, String),
    /// Nothing arrives before the caller's deadline.
    TimeoutNoData,
}

#[derive(Default)]
struct Inner {
    sent: Vec<Vec<u8>>,
    replies: VecDeque<ScriptedReply>,
}

/// Cheaply clonable handle; clones share the same underlying log and script,
/// which is what lets a test hand one `MockTransport` to a controller while
/// keeping another handle around to inspect/extend it afterwards.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn push_frame(&self, frame: Vec<u8>) {
        self.inner.lock().unwrap().replies.push_back(ScriptedReply::Frame(frame));
    }

    pub fn push_error(&self, kind: TransportErrorKind, message: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .push_back(ScriptedReply::Error(kind, message.into()));
    }

    pub fn push_timeout(&self) {
        self.inner.lock().unwrap().replies.push_back(ScriptedReply::TimeoutNoData);
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.inner.lock().unwrap().sent.push(frame.to_vec());
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8], _deadline: Duration) -> Result<usize, TransportError> {
        let reply = self.inner.lock().unwrap().replies.pop_front();
        match reply {
            Some(ScriptedReply::Frame(frame)) => {
                if frame.len() > buf.len() {
                    return Err(TransportError::new(TransportErrorKind::Io, "mock frame larger than buffer"));
                }
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(frame.len())
            }
            Some(ScriptedReply::Error(kind, message)) => Err(TransportError::new(kind, message)),
            Some(ScriptedReply::TimeoutNoData) | None => {
                Err(TransportError::new(TransportErrorKind::TimedOut, "no scripted reply available"))
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::KernelCharDevice
    }
}
