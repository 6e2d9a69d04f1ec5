//! # Peer Link Service
//!
//! Drives one `PeerLink` per peer address through the lifecycle table and
//! performs the dataplane side effects of each transition.
//!
//! ## Architecture
//!
//! Implements both inbound ports:
//! - [`PeerLinkApi`]: local setup / teardown / queries
//! - [`PeerLinkNotifications`]: peer-initiated and implicit events
//!
//! Depends on two outbound ports (adapters live in bridge-runtime):
//! - [`DataplaneRegistry`]: station registration
//! - [`CapabilityExchange`]: capability round trip with the peer
//!
//! ## Locking
//!
//! Each link sits behind its own mutex inside a `DashMap`, so operations on
//! two peers never share a lock. The per-peer lock is released for the
//! capability exchange. The map lock is never held while waiting on a peer
//! lock, so a record may be removed from the map under its own lock.
//!
//! A record that is Idle without `force_keep` carries nothing beyond its
//! address and is removed when the operation that left it there returns.

use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{ErrorKind, MacAddr, StationIndex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    ImplicitTeardownReason, PeerCapabilities, PeerLink, PeerLinkConfig, PeerLinkCounters,
    PeerLinkEvent, PeerLinkState, PeerLinkStats, SetupStart,
};
use crate::ports::inbound::{PeerLinkApi, PeerLinkNotifications};
use crate::ports::outbound::{CapabilityExchange, DataplaneRegistry, TransitionObserver};


type SharedLink = Arc<Mutex<PeerLink>>;

/// Peer-link state machine registry.
pub struct PeerLinkService<D, X>
where
    D: DataplaneRegistry,
    X: CapabilityExchange,
{
    config: PeerLinkConfig,
    links: DashMap<MacAddr, SharedLink>,
    /// Links outside Idle; reserved before Idle → Connecting.
    active: AtomicUsize,
    /// Source of setup attempt ids; unique across record lifetimes.
    setup_epochs: AtomicU64,
    counters: PeerLinkCounters,
    dataplane: Arc<D>,
    exchange: Arc<X>,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl<D, X> PeerLinkService<D, X>
where
    D: DataplaneRegistry,
    X: CapabilityExchange,
{
    pub fn new(config: PeerLinkConfig, dataplane: Arc<D>, exchange: Arc<X>) -> Self {
        info!(
            max_peers = config.max_peers,
            exchange_timeout_ms = config.capability_exchange_timeout.as_millis() as u64,
            "Initializing peer link service"
        );
        Self {
            config,
            links: DashMap::new(),
            active: AtomicUsize::new(0),
            setup_epochs: AtomicU64::new(1),
            counters: PeerLinkCounters::default(),
            dataplane,
            exchange,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PeerLinkConfig {
        &self.config
    }

    // =========================================================================
    // SETUP
    // =========================================================================

    /// Full local setup: request, capability exchange, registration.
    pub fn peer_setup(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        let epoch = match self.begin_setup(peer)? {
            (SetupStart::Started, epoch) => epoch,
            (already, _) => {
                debug!(peer = %peer, outcome = ?already, "Setup already in progress or done");
                return Ok(());
            }
        };

        let result = self
            .exchange
            .exchange(
                peer,
                &self.config.local_capabilities,
                self.config.capability_exchange_timeout,
            )
            .and_then(|caps| {
                caps.validate()
                    .map(|()| caps)
                    .map_err(|reason| ErrorKind::CapabilityExchangeFailed { reason })
            });

        self.finish_setup(peer, Some(epoch), result).map(|_| ())
    }

    /// First half of setup: capacity check and Idle → Connecting.
    pub fn request_setup(&self, peer: MacAddr) -> Result<SetupStart, ErrorKind> {
        self.begin_setup(peer).map(|(start, _)| start)
    }

    /// `request_setup` that also returns the id of the attempt in progress.
    fn begin_setup(&self, peer: MacAddr) -> Result<(SetupStart, u64), ErrorKind> {
        self.with_link(peer, |link| match link.state {
            PeerLinkState::Connecting => Ok((SetupStart::AlreadyConnecting, link.setup_epoch)),
            PeerLinkState::Connected => Ok((SetupStart::AlreadyConnected, link.setup_epoch)),
            PeerLinkState::Tearing => Err(ErrorKind::InvalidTransition {
                from: link.state.as_str(),
                event: PeerLinkEvent::RequestSetup.as_str(),
            }),
            PeerLinkState::Idle => {
                if !self.reserve_slot() {
                    PeerLinkCounters::bump(&self.counters.capacity_rejections);
                    warn!(
                        peer = %peer,
                        max_peers = self.config.max_peers,
                        "Peer capacity reached, refusing setup"
                    );
                    return Err(ErrorKind::CapacityExceeded {
                        max: self.config.max_peers,
                    });
                }
                if let Err(err) = self.transition(link, PeerLinkEvent::RequestSetup) {
                    self.release_slot();
                    return Err(err);
                }
                link.setup_epoch = self.setup_epochs.fetch_add(1, Ordering::Relaxed);
                PeerLinkCounters::bump(&self.counters.setups_started);
                Ok((SetupStart::Started, link.setup_epoch))
            }
        })
    }

    /// Second half of setup: registration on success, back to Idle otherwise.
    pub fn complete_setup(
        &self,
        peer: MacAddr,
        result: Result<PeerCapabilities, ErrorKind>,
    ) -> Result<StationIndex, ErrorKind> {
        self.finish_setup(peer, None, result)
    }

    /// Complete the attempt `epoch`, or whichever attempt is in progress
    /// when `None`. A result for an attempt that was reset and started over
    /// leaves the newer attempt untouched.
    fn finish_setup(
        &self,
        peer: MacAddr,
        epoch: Option<u64>,
        result: Result<PeerCapabilities, ErrorKind>,
    ) -> Result<StationIndex, ErrorKind> {
        self.with_link(peer, |link| {
            let superseded = epoch.is_some_and(|epoch| epoch != link.setup_epoch);
            if superseded {
                debug!(peer = %peer, state = link.state.as_str(), "Dropping result of a superseded setup");
            }
            if link.state != PeerLinkState::Connecting || superseded {
                return Err(ErrorKind::InvalidTransition {
                    from: link.state.as_str(),
                    event: PeerLinkEvent::SetupSucceeded.as_str(),
                });
            }

            let caps = match result {
                Ok(caps) => caps,
                Err(err) => {
                    self.fail_setup(link, &err);
                    return Err(err);
                }
            };

            match self.dataplane.register(peer, &caps) {
                Ok(station_index) => {
                    link.station_index = Some(station_index);
                    link.capabilities = Some(caps);
                    self.transition(link, PeerLinkEvent::SetupSucceeded)?;
                    PeerLinkCounters::bump(&self.counters.setups_completed);
                    info!(peer = %peer, station_index = %station_index, "Peer link connected");
                    Ok(station_index)
                }
                Err(reason) => {
                    let err = ErrorKind::DataplaneRegistrationFailed { reason };
                    self.fail_setup(link, &err);
                    Err(err)
                }
            }
        })
    }

    fn fail_setup(&self, link: &mut PeerLink, err: &ErrorKind) {
        if let Err(transition_err) = self.transition(link, PeerLinkEvent::SetupFailed) {
            warn!(peer = %link.addr, error = %transition_err, "Could not roll back setup");
        }
        PeerLinkCounters::bump(&self.counters.setups_failed);
        warn!(peer = %link.addr, error = %err, "Peer link setup failed");
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    pub fn peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        self.with_existing(peer, |link| self.teardown_locked(link, PeerLinkEvent::Teardown))
            .unwrap_or(Err(ErrorKind::NotConnected))
    }

    fn teardown_locked(&self, link: &mut PeerLink, event: PeerLinkEvent) -> Result<(), ErrorKind> {
        match link.state {
            PeerLinkState::Idle | PeerLinkState::Connecting => Err(ErrorKind::NotConnected),
            PeerLinkState::Connected => {
                self.transition(link, event)?;
                self.unregister_locked(link)
            }
            PeerLinkState::Tearing => {
                debug!(peer = %link.addr, "Retrying station unregistration");
                self.unregister_locked(link)
            }
        }
    }

    fn unregister_locked(&self, link: &mut PeerLink) -> Result<(), ErrorKind> {
        if let Some(station_index) = link.station_index {
            if let Err(reason) = self.dataplane.unregister(station_index) {
                PeerLinkCounters::bump(&self.counters.unregistration_failures);
                warn!(
                    peer = %link.addr,
                    station_index = %station_index,
                    reason = %reason,
                    "Station unregistration failed, link stays in tearing"
                );
                return Err(ErrorKind::DataplaneUnregistrationFailed { station_index });
            }
        }

        self.transition(link, PeerLinkEvent::UnregistrationConfirmed)?;
        PeerLinkCounters::bump(&self.counters.teardowns);
        info!(peer = %link.addr, "Peer link torn down");
        Ok(())
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub fn on_peer_setup_request(
        &self,
        peer: MacAddr,
        capabilities: PeerCapabilities,
    ) -> Result<(), ErrorKind> {
        capabilities
            .validate()
            .map_err(|reason| ErrorKind::CapabilityExchangeFailed { reason })?;

        match self.begin_setup(peer)? {
            (SetupStart::Started, epoch) => self
                .finish_setup(peer, Some(epoch), Ok(capabilities))
                .map(|_| ()),
            (SetupStart::AlreadyConnecting | SetupStart::AlreadyConnected, _) => Ok(()),
        }
    }

    pub fn on_peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        self.with_existing(peer, |link| self.teardown_locked(link, PeerLinkEvent::PeerTeardown))
            .unwrap_or(Err(ErrorKind::NotConnected))
    }

    pub fn on_implicit_teardown(
        &self,
        peer: MacAddr,
        reason: ImplicitTeardownReason,
    ) -> Result<bool, ErrorKind> {
        self.with_existing(peer, |link| {
            if link.force_keep {
                PeerLinkCounters::bump(&self.counters.implicit_suppressed);
                debug!(
                    peer = %peer,
                    reason = reason.as_str(),
                    "Implicit teardown suppressed by force_keep"
                );
                return Ok(false);
            }
            debug!(peer = %peer, reason = reason.as_str(), "Implicit teardown");
            self.teardown_locked(link, PeerLinkEvent::Teardown).map(|()| true)
        })
        .unwrap_or(Err(ErrorKind::NotConnected))
    }

    // =========================================================================
    // CAPABILITIES AND QUERIES
    // =========================================================================

    /// Renegotiate capabilities of a Connected peer. The link stays
    /// Connected when the exchange fails.
    pub fn update_capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        let station_index = self
            .with_existing(peer, |link| link.station_index())
            .unwrap_or(Err(ErrorKind::NotConnected))?;

        let caps = self
            .exchange
            .exchange(
                peer,
                &self.config.local_capabilities,
                self.config.capability_exchange_timeout,
            )
            .and_then(|caps| {
                caps.validate()
                    .map(|()| caps)
                    .map_err(|reason| ErrorKind::CapabilityExchangeFailed { reason })
            })?;

        self.with_existing(peer, |link| {
            // The link may have been torn down and set up again meanwhile.
            if link.station_index() != Ok(station_index) {
                return Err(ErrorKind::NotConnected);
            }
            self.dataplane
                .update_station(station_index, &caps)
                .map_err(|reason| ErrorKind::DataplaneRegistrationFailed { reason })?;
            link.capabilities = Some(caps.clone());
            debug!(peer = %peer, station_index = %station_index, "Capabilities renegotiated");
            Ok(caps)
        })
        .unwrap_or(Err(ErrorKind::NotConnected))
    }

    pub fn set_force_keep(&self, peer: MacAddr, keep: bool) {
        self.with_link(peer, |link| link.force_keep = keep);
    }

    pub fn peer_state(&self, peer: MacAddr) -> PeerLinkState {
        self.with_existing(peer, |link| link.state)
            .unwrap_or(PeerLinkState::Idle)
    }

    pub fn station_index(&self, peer: MacAddr) -> Result<StationIndex, ErrorKind> {
        self.with_existing(peer, |link| link.station_index())
            .unwrap_or(Err(ErrorKind::NotConnected))
    }

    pub fn capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        self.with_existing(peer, |link| link.capabilities().cloned())
            .unwrap_or(Err(ErrorKind::NotConnected))
    }

    /// Every peer outside Idle with its state.
    pub fn active_peers(&self) -> Vec<(MacAddr, PeerLinkState)> {
        self.snapshot_links()
            .into_iter()
            .filter_map(|shared| {
                let link = shared.lock();
                let entry = (link.addr, link.state);
                (!link.retired && link.state.is_active()).then_some(entry)
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PeerLinkStats {
        PeerLinkStats::from_counters(
            &self.counters,
            self.active_count(),
            self.config.max_peers,
            self.links.len(),
        )
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Return every link to Idle, unregistering stations best-effort.
    ///
    /// Returns the number of links that were not Idle.
    pub fn force_cleanup(&self) -> usize {
        let mut cleaned = 0;

        for shared in self.snapshot_links() {
            let mut link = shared.lock();
            if link.retired || !link.state.is_active() {
                continue;
            }
            cleaned += 1;

            if link.state == PeerLinkState::Connected {
                if let Err(err) = self.transition(&mut link, PeerLinkEvent::Teardown) {
                    warn!(peer = %link.addr, error = %err, "Cleanup teardown failed");
                    continue;
                }
            }

            let event = match (link.state, link.station_index) {
                (PeerLinkState::Tearing, Some(station_index)) => {
                    match self.dataplane.unregister(station_index) {
                        Ok(()) => PeerLinkEvent::UnregistrationConfirmed,
                        Err(reason) => {
                            PeerLinkCounters::bump(&self.counters.unregistration_failures);
                            warn!(
                                peer = %link.addr,
                                station_index = %station_index,
                                reason = %reason,
                                "Cleanup could not unregister station"
                            );
                            PeerLinkEvent::ForceCleanup
                        }
                    }
                }
                _ => PeerLinkEvent::ForceCleanup,
            };

            if let Err(err) = self.transition(&mut link, event) {
                warn!(peer = %link.addr, error = %err, "Cleanup transition failed");
            }
        }

        if cleaned > 0 {
            info!(cleaned, "Peer links force-cleaned");
        }
        cleaned
    }

    /// Drop Idle records from the registry. Records that are locked or
    /// carry `force_keep` are kept.
    pub fn prune_idle(&self) -> usize {
        let mut pruned = 0;
        self.links.retain(|_, shared| match shared.try_lock() {
            Some(mut link) if link.state == PeerLinkState::Idle && !link.force_keep => {
                link.retired = true;
                pruned += 1;
                false
            }
            _ => true,
        });
        if pruned > 0 {
            debug!(pruned, "Pruned idle peer records");
        }
        pruned
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Run `f` on the record for `peer`, creating it if needed.
    fn with_link<R>(&self, peer: MacAddr, f: impl FnOnce(&mut PeerLink) -> R) -> R {
        loop {
            let shared = Arc::clone(
                self.links
                    .entry(peer)
                    .or_insert_with(|| Arc::new(Mutex::new(PeerLink::new(peer))))
                    .value(),
            );
            let mut link = shared.lock();
            if link.retired {
                continue;
            }
            let out = f(&mut link);
            self.retire_if_idle(&shared, &mut link);
            return out;
        }
    }

    /// Run `f` on the record for `peer` if one exists.
    fn with_existing<R>(&self, peer: MacAddr, f: impl FnOnce(&mut PeerLink) -> R) -> Option<R> {
        loop {
            let shared = self.links.get(&peer).map(|entry| Arc::clone(entry.value()))?;
            let mut link = shared.lock();
            if link.retired {
                continue;
            }
            let out = f(&mut link);
            self.retire_if_idle(&shared, &mut link);
            return Some(out);
        }
    }

    /// Remove a plain Idle record from the map. Called under its lock.
    fn retire_if_idle(&self, shared: &SharedLink, link: &mut PeerLink) {
        if link.state != PeerLinkState::Idle || link.force_keep {
            return;
        }
        link.retired = true;
        self.links
            .remove_if(&link.addr, |_, current| Arc::ptr_eq(current, shared));
    }

    fn snapshot_links(&self) -> Vec<SharedLink> {
        self.links
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn reserve_slot(&self) -> bool {
        let max = self.config.max_peers;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_ok()
    }

    fn release_slot(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Apply `event` and keep the slot count in step with the state.
    fn transition(&self, link: &mut PeerLink, event: PeerLinkEvent) -> Result<(), ErrorKind> {
        let from = link.apply(event)?;
        let to = link.state;
        if from.is_active() && !to.is_active() {
            self.release_slot();
        }
        let active = self.active_count();

        debug!(
            peer = %link.addr,
            from = from.as_str(),
            to = to.as_str(),
            event = event.as_str(),
            active,
            "Peer link transition"
        );
        if let Some(observer) = &self.observer {
            observer.on_transition(link.addr, from, to, active);
        }
        Ok(())
    }
}

impl<D, X> PeerLinkApi for PeerLinkService<D, X>
where
    D: DataplaneRegistry,
    X: CapabilityExchange,
{
    fn peer_setup(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        PeerLinkService::peer_setup(self, peer)
    }

    fn peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        PeerLinkService::peer_teardown(self, peer)
    }

    fn peer_state(&self, peer: MacAddr) -> PeerLinkState {
        PeerLinkService::peer_state(self, peer)
    }

    fn station_index(&self, peer: MacAddr) -> Result<StationIndex, ErrorKind> {
        PeerLinkService::station_index(self, peer)
    }

    fn capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        PeerLinkService::capabilities(self, peer)
    }

    fn update_capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        PeerLinkService::update_capabilities(self, peer)
    }

    fn set_force_keep(&self, peer: MacAddr, keep: bool) {
        PeerLinkService::set_force_keep(self, peer, keep)
    }

    fn stats(&self) -> PeerLinkStats {
        PeerLinkService::stats(self)
    }
}

impl<D, X> PeerLinkNotifications for PeerLinkService<D, X>
where
    D: DataplaneRegistry,
    X: CapabilityExchange,
{
    fn on_peer_setup_request(
        &self,
        peer: MacAddr,
        capabilities: PeerCapabilities,
    ) -> Result<(), ErrorKind> {
        PeerLinkService::on_peer_setup_request(self, peer, capabilities)
    }

    fn on_peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        PeerLinkService::on_peer_teardown(self, peer)
    }

    fn on_implicit_teardown(
        &self,
        peer: MacAddr,
        reason: ImplicitTeardownReason,
    ) -> Result<bool, ErrorKind> {
        PeerLinkService::on_implicit_teardown(self, peer, reason)
    }
}
