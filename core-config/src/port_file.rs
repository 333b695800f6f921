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

//! The port-file convention: the compute server writes its
//! bound port, in ASCII digits, to a well-known path so co-located clients
//! can discover it without a separate handshake. Modeled as an injected
//! interface rather than a hardcoded path so tests can point it at a temp
//! file.

use std::io;
use std::path::{Path, PathBuf};

pub struct PortAdvertiser {
    path: PathBuf,
}

impl PortAdvertiser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The default path used across the fleet: `<runtime-tmp>/hasher-host.port`.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("hasher-host.port")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn advertise(&self, port: u16) -> io::Result<()> {
        std::fs::write(&self.path, port.to_string())
    }

    pub fn read(&self) -> io::Result<u16> {
        let text = std::fs::read_to_string(&self.path)?;
        text.trim()
.parse()
.map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "port file is not a u16"))
    }

    /// Removed on clean shutdown.
    pub fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advertise_then_read_round_trips() {
        let path = std::env::temp_dir().join(format!("port-file-test-{:?}.port", std::thread::current().id()));
        let advertiser = PortAdvertiser::new(&path);
        advertiser.advertise(8123).unwrap();
        assert_eq!(advertiser.read().unwrap(), 8123);
        advertiser.remove().unwrap();
        assert!(advertiser.read().is_err());
    }

    #[test]
    fn remove_of_missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join(format!("port-file-missing-{:?}.port", std::thread::current().id()));
        let advertiser = PortAdvertiser::new(&path);
        advertiser.remove().unwrap();
    }
}
