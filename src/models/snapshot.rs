use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Length of a torrent identifier in bytes (SHA-1 info hash).
pub const TORRENT_ID_LEN: usize = 20;

/// Fixed-length unique identifier of a torrent.
///
/// Displayed and parsed as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TorrentId([u8; TORRENT_ID_LEN]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TorrentIdError {
    #[error("invalid hex in torrent id: {0}")]
    InvalidHex(String),

    #[error("torrent id must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl TorrentId {
    pub const fn new(bytes: [u8; TORRENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TORRENT_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check whether the hex form of this id starts with `prefix` (case-insensitive).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl FromStr for TorrentId {
    type Err = TorrentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| TorrentIdError::InvalidHex(e.to_string()))?;
        let actual = bytes.len();
        let bytes: [u8; TORRENT_ID_LEN] =
            bytes.try_into().map_err(|_| TorrentIdError::InvalidLength {
                expected: TORRENT_ID_LEN,
                actual,
            })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for TorrentId {
    type Error = TorrentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TorrentId> for String {
    fn from(id: TorrentId) -> Self {
        id.to_hex()
    }
}

impl fmt::Display for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TorrentId({})", self.to_hex())
    }
}

/// Immutable point-in-time record of a torrent's observable state.
///
/// Snapshots are never mutated once published: the engine builds a new one for
/// every change and the foreground replaces the old value wholesale, so a
/// reader can never observe a half-updated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSnapshot {
    pub id: TorrentId,
    pub name: String,

    // Sizes in bytes
    pub total_size: u64,
    pub selected_size: u64,
    pub downloaded_size: u64,
    pub uploaded_size: u64,

    /// Fraction of the selected data that is present, in `[0, 1]`
    pub progress: f64,

    // Peers
    pub total_peer_count: usize,
    pub downloading_peer_count: usize,
    pub uploading_peer_count: usize,

    // Speeds in bytes per second
    pub download_speed: u64,
    pub upload_speed: u64,

    pub paused: bool,
    pub complete: bool,
    pub single_file_mode: bool,
}

impl TorrentSnapshot {
    /// Share ratio: uploaded bytes over downloaded bytes, `0.0` before any download.
    pub fn ratio(&self) -> f64 {
        if self.downloaded_size == 0 {
            0.0
        } else {
            self.uploaded_size as f64 / self.downloaded_size as f64
        }
    }

    /// Estimated time until the selected data is complete.
    ///
    /// `None` when paused, complete, or not currently receiving data.
    pub fn eta(&self) -> Option<Duration> {
        if self.paused || self.complete || self.download_speed == 0 {
            return None;
        }
        let remaining = self.selected_size.saturating_sub(self.downloaded_size);
        Some(Duration::from_secs(remaining.div_ceil(self.download_speed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> TorrentSnapshot {
        TorrentSnapshot {
            id: TorrentId::new([7; TORRENT_ID_LEN]),
            name: name.to_string(),
            total_size: 1000,
            selected_size: 800,
            downloaded_size: 200,
            uploaded_size: 100,
            progress: 0.25,
            total_peer_count: 5,
            downloading_peer_count: 2,
            uploading_peer_count: 1,
            download_speed: 100,
            upload_speed: 0,
            paused: false,
            complete: false,
            single_file_mode: false,
        }
    }

    #[test]
    fn test_torrent_id_hex_round_trip() {
        let id: TorrentId = "00112233445566778899aabbccddeeff00112233".parse().unwrap();
        assert_eq!(id.to_string(), "00112233445566778899aabbccddeeff00112233");
        assert_eq!(id.as_bytes()[1], 0x11);
    }

    #[test]
    fn test_torrent_id_rejects_wrong_length() {
        let err = "0011".parse::<TorrentId>().unwrap_err();
        assert_eq!(
            err,
            TorrentIdError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
        assert!(matches!(
            "zz".parse::<TorrentId>(),
            Err(TorrentIdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_torrent_id_prefix_match() {
        let id = TorrentId::new([0xab; TORRENT_ID_LEN]);
        assert!(id.matches_prefix("abab"));
        assert!(id.matches_prefix("ABA"));
        assert!(!id.matches_prefix("abc"));
        assert!(!id.matches_prefix(""));
    }

    #[test]
    fn test_ratio() {
        let mut snapshot = sample("a");
        assert_eq!(snapshot.ratio(), 0.5);
        snapshot.downloaded_size = 0;
        assert_eq!(snapshot.ratio(), 0.0);
    }

    #[test]
    fn test_eta() {
        let mut snapshot = sample("a");
        assert_eq!(snapshot.eta(), Some(Duration::from_secs(6)));

        snapshot.paused = true;
        assert_eq!(snapshot.eta(), None);

        snapshot.paused = false;
        snapshot.download_speed = 0;
        assert_eq!(snapshot.eta(), None);
    }
}
