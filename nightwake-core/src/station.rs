//! Favorite radio stations
//!
//! Stations occupy fixed slots; a slot without a stream URL is unavailable.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single internet radio station
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RadioStation {
    pub name: String,
    /// Stream URL; empty marks the slot as unavailable
    pub stream: String,
    /// Silence after the stream is ready, before fading in
    #[serde(default)]
    pub mute_delay_ms: u64,
}

impl RadioStation {
    pub fn new(name: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream: stream.into(),
            mute_delay_ms: 0,
        }
    }

    /// Builder method to set the mute delay
    pub fn with_mute_delay(mut self, mute_delay_ms: u64) -> Self {
        self.mute_delay_ms = mute_delay_ms;
        self
    }

    pub fn is_available(&self) -> bool {
        !self.stream.trim().is_empty()
    }
}

/// Ordered list of favorite stations
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FavoriteStations {
    stations: Vec<RadioStation>,
}

impl FavoriteStations {
    pub fn new(stations: Vec<RadioStation>) -> Self {
        Self { stations }
    }

    /// Station in slot `index` if that slot is available
    pub fn get(&self, index: usize) -> Option<&RadioStation> {
        self.stations.get(index).filter(|s| s.is_available())
    }

    /// Like `get`, but reports which slot was missing
    pub fn get_or_err(&self, index: usize) -> Result<&RadioStation> {
        self.get(index).ok_or(CoreError::StationNotFound(index))
    }

    /// Number of slots, available or not
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn num_available(&self) -> usize {
        self.stations.iter().filter(|s| s.is_available()).count()
    }

    /// Next available slot after `current`, wrapping around
    ///
    /// Returns `current` when no other slot is available.
    pub fn next_available_index(&self, current: usize) -> usize {
        let len = self.stations.len();
        if len == 0 {
            return current;
        }

        (1..len)
            .map(|step| (current + step) % len)
            .find(|&index| self.stations[index].is_available())
            .unwrap_or(current)
    }

    /// Available stations with their slot index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RadioStation)> {
        self.stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_available())
    }

    pub fn push(&mut self, station: RadioStation) -> usize {
        self.stations.push(station);
        self.stations.len() - 1
    }
}
