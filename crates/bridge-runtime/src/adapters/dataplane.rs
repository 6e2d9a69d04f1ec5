//! In-memory dataplane station registry.
//!
//! Hands out station indices from a fixed pool and remembers which peer owns
//! each one. Stands in for the driver's station table on hosts without one.

use ob_02_peer_link::{DataplaneRegistry, PeerCapabilities};
use parking_lot::Mutex;
use shared_types::{MacAddr, StationIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// First index handed out; lower indices belong to the AP association.
pub const FIRST_PEER_STATION: u16 = 5;

#[derive(Debug)]
struct Stations {
    free: BTreeSet<u16>,
    registered: HashMap<StationIndex, (MacAddr, PeerCapabilities)>,
}

/// Fixed-size station-index pool.
#[derive(Debug)]
pub struct InMemoryDataplane {
    stations: Mutex<Stations>,
}

impl InMemoryDataplane {
    /// Pool of `slots` indices starting at [`FIRST_PEER_STATION`].
    pub fn new(slots: u16) -> Self {
        Self::with_range(FIRST_PEER_STATION, slots)
    }

    pub fn with_range(first: u16, slots: u16) -> Self {
        let free = (first..first.saturating_add(slots)).collect();
        Self {
            stations: Mutex::new(Stations {
                free,
                registered: HashMap::new(),
            }),
        }
    }

    pub fn registered_count(&self) -> usize {
        self.stations.lock().registered.len()
    }

    /// Peer owning `station_index`, if registered.
    pub fn peer_for(&self, station_index: StationIndex) -> Option<MacAddr> {
        self.stations
            .lock()
            .registered
            .get(&station_index)
            .map(|(peer, _)| *peer)
    }

    pub fn capabilities_for(&self, station_index: StationIndex) -> Option<PeerCapabilities> {
        self.stations
            .lock()
            .registered
            .get(&station_index)
            .map(|(_, caps)| caps.clone())
    }
}

impl DataplaneRegistry for InMemoryDataplane {
    fn register(
        &self,
        peer: MacAddr,
        capabilities: &PeerCapabilities,
    ) -> Result<StationIndex, String> {
        let mut stations = self.stations.lock();
        if stations.registered.values().any(|(owner, _)| *owner == peer) {
            return Err(format!("{peer} already has a station entry"));
        }
        let index = stations
            .free
            .pop_first()
            .ok_or_else(|| "station table full".to_string())?;
        let station_index = StationIndex(index);
        stations
            .registered
            .insert(station_index, (peer, capabilities.clone()));

        debug!(peer = %peer, station_index = index, "Station registered");
        Ok(station_index)
    }

    fn unregister(&self, station_index: StationIndex) -> Result<(), String> {
        let mut stations = self.stations.lock();
        match stations.registered.remove(&station_index) {
            Some((peer, _)) => {
                stations.free.insert(station_index.0);
                debug!(peer = %peer, station_index = station_index.0, "Station unregistered");
                Ok(())
            }
            None => Err(format!("station {station_index} is not registered")),
        }
    }

    fn update_station(
        &self,
        station_index: StationIndex,
        capabilities: &PeerCapabilities,
    ) -> Result<(), String> {
        let mut stations = self.stations.lock();
        match stations.registered.get_mut(&station_index) {
            Some(entry) => {
                entry.1 = capabilities.clone();
                Ok(())
            }
            None => Err(format!("station {station_index} is not registered")),
        }
    }
}
