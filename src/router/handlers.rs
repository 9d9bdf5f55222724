//! RX event loop and datagram handlers.

use super::*;
use crate::fabric::{Destination, ReceivedDatagram};
use crate::pending::Enqueue;
use crate::protocol::{
    AddressQuery, MeshData, MeshMessage, URI_ADDRESS_NOTIFY, URI_ADDRESS_QUERY,
};
use crate::resolver::{NotifyOutcome, Resolution};
use std::time::Duration;
use tracing::warn;

impl Router {
    // === RX Event Loop ===

    /// Run the receive event loop.
    ///
    /// Processes datagrams from the fabric, dispatching on the message
    /// type byte, and runs the periodic maintenance tick: query retries
    /// and exhaustion, binding expiry, and topology timeouts.
    ///
    /// This method takes ownership of the datagram channel and runs
    /// until the channel is closed (typically when stop() is called).
    pub async fn run(&mut self) -> Result<(), RouterError> {
        let mut datagram_rx = self.datagram_rx.take().ok_or(RouterError::NotStarted)?;

        let mut tick =
            tokio::time::interval(Duration::from_secs(self.config.router.tick_interval_secs));

        info!("Router event loop started");

        loop {
            tokio::select! {
                dgram = datagram_rx.recv() => {
                    match dgram {
                        Some(d) => self.process_datagram(d).await,
                        None => break, // channel closed
                    }
                }
                _ = tick.tick() => {
                    self.run_tick(lifecycle::unix_now_ms()).await;
                }
            }
        }

        info!("Router event loop stopped (channel closed)");
        Ok(())
    }

    /// Process a single received datagram.
    ///
    /// Dispatches on the decoded message variant. Undecodable frames are
    /// dropped without a reply.
    pub(super) async fn process_datagram(&mut self, dgram: ReceivedDatagram) {
        let now_ms = dgram.timestamp_ms;

        // Any datagram is a sign of life for the sending router.
        if self.routers.note_heard(dgram.src.router_id(), now_ms) {
            debug!(router_id = %dgram.src.router_id(), "Peer router heard");
        }

        let message = match MeshMessage::decode(&dgram.payload) {
            Ok(m) => m,
            Err(e) => {
                debug!(src = %dgram.src, error = %e, "Undecodable frame, dropping");
                return;
            }
        };

        match message {
            MeshMessage::Data(data) => self.handle_data(data, dgram.src, now_ms).await,
            MeshMessage::Query(query) => self.handle_address_query(query, now_ms).await,
            MeshMessage::Notify(notify) => self.handle_notification(notify, now_ms).await,
        }
    }

    // === Host TX ===

    /// Send an application payload to an endpoint somewhere on the mesh.
    ///
    /// Local destinations loop straight back to the delivery channel.
    /// Unresolved destinations park the datagram and open a query cycle;
    /// it rides out when the binding arrives, or ages out if none does.
    pub async fn send_data(&mut self, dest: Eid, payload: Vec<u8>) -> Result<(), RouterError> {
        if !self.state.is_operational() {
            return Err(RouterError::NotStarted);
        }
        if self.owns_eid(&dest) {
            self.deliver_local(dest, self.origin, payload);
            return Ok(());
        }
        let frame = MeshData::new(dest, payload).encode();
        self.forward_or_queue(dest, frame, lifecycle::unix_now_ms())
            .await;
        Ok(())
    }

    // === Data Plane ===

    /// Handle a data datagram: deliver locally if the destination
    /// terminates here, otherwise forward toward its current locator.
    pub(super) async fn handle_data(&mut self, data: MeshData, src: Rloc16, now_ms: u64) {
        if self.owns_eid(&data.dest) {
            self.deliver_local(data.dest, src, data.payload);
            return;
        }
        let frame = data.encode();
        self.forward_or_queue(data.dest, frame, now_ms).await;
    }

    /// Whether the endpoint terminates at this router (its own, or a
    /// registered child's).
    pub(super) fn owns_eid(&self, eid: &Eid) -> bool {
        self.own_eids.contains(eid) || self.children.owner_of(eid).is_some()
    }

    /// Hand a datagram to the host. Drops when the host is not keeping
    /// up rather than stalling the event loop.
    fn deliver_local(&mut self, dest: Eid, src: Rloc16, payload: Vec<u8>) {
        let Some(tx) = self.deliver_tx.as_ref() else {
            self.stats.dropped += 1;
            return;
        };
        match tx.try_send(Delivery { dest, src, payload }) {
            Ok(()) => self.stats.delivered += 1,
            Err(_) => {
                self.stats.dropped += 1;
                warn!(dest = %dest, "Delivery channel full, dropping");
            }
        }
    }

    /// Send a frame toward an endpoint, opening a query cycle and
    /// parking the frame when no binding is known. Never blocks the
    /// caller on resolution.
    pub(super) async fn forward_or_queue(&mut self, dest: Eid, frame: Vec<u8>, now_ms: u64) {
        match self.resolver.resolve(dest, now_ms) {
            Resolution::Deliver(locator) => {
                self.stats.forwarded += 1;
                self.send_frame(Destination::Unicast(locator), &frame).await;
            }
            Resolution::Pending { query } => {
                match self.resolver.enqueue_packet(dest, frame, now_ms) {
                    Enqueue::Queued => self.stats.queued += 1,
                    Enqueue::DisplacedOldest => {
                        self.stats.queued += 1;
                        self.stats.dropped += 1;
                        debug!(dest = %dest, "Pending queue full, displaced oldest");
                    }
                    Enqueue::Refused => {
                        self.stats.dropped += 1;
                        debug!(dest = %dest, "Pending queue refused, dropping");
                    }
                }
                if let Some(query) = query {
                    debug!(
                        target = %query.target,
                        request_id = query.request_id,
                        uri = URI_ADDRESS_QUERY,
                        "Issuing address query"
                    );
                    self.send_frame(Destination::AllRouters, &query.encode())
                        .await;
                }
            }
            Resolution::Refused => {
                self.stats.dropped += 1;
                debug!(dest = %dest, "Resolver at capacity, dropping");
            }
        }
    }

    // === Resolution Plane ===

    /// Handle an address query: answer when the target terminates here.
    ///
    /// The answer is unicast to the querier, echoing the cycle id. For a
    /// child's endpoint the advertised locator is the child's, and the
    /// freshness token reflects when the child last showed life.
    pub(super) async fn handle_address_query(&mut self, query: AddressQuery, now_ms: u64) {
        let answer = if self.own_eids.contains(&query.target) {
            Some(AddressNotification::solicited(
                query.request_id,
                query.target,
                self.origin,
                0,
            ))
        } else if let Some(child_id) = self.children.owner_of(&query.target) {
            let last_contact = self
                .children
                .last_contact_secs(&child_id, now_ms)
                .unwrap_or(0);
            Some(AddressNotification::solicited(
                query.request_id,
                query.target,
                Rloc16::child(self.router_id, child_id),
                last_contact,
            ))
        } else {
            None
        };

        let Some(answer) = answer else { return };
        debug!(
            target = %answer.target,
            locator = %answer.locator,
            request_id = answer.request_id,
            uri = URI_ADDRESS_NOTIFY,
            "Answering address query"
        );
        self.send_frame(Destination::Unicast(query.origin), &answer.encode())
            .await;
    }

    /// Handle an address notification: apply it to the resolver and, on
    /// acceptance, flush parked frames to the learned locator.
    pub(super) async fn handle_notification(&mut self, notify: AddressNotification, now_ms: u64) {
        match self.resolver.handle_notification(&notify, now_ms) {
            NotifyOutcome::Bound { locator, packets } => {
                info!(
                    eid = %notify.target,
                    locator = %locator,
                    solicited = notify.is_solicited(),
                    "Binding learned"
                );
                for frame in packets {
                    self.stats.forwarded += 1;
                    self.send_frame(Destination::Unicast(locator), &frame).await;
                }
            }
            NotifyOutcome::Rejected(reason) => {
                debug!(
                    eid = %notify.target,
                    locator = %notify.locator,
                    reason = ?reason,
                    "Notification rejected"
                );
            }
        }
    }

    // === TX Helpers ===

    /// Best-effort frame send; failures are logged, never propagated
    /// into the forwarding path.
    pub(super) async fn send_frame(&self, dest: Destination, frame: &[u8]) {
        let Some(fabric) = self.fabric.as_ref() else {
            debug!(dest = %dest, "No fabric attached, dropping frame");
            return;
        };
        if let Err(e) = fabric.send(dest, frame).await {
            warn!(dest = %dest, error = %e, "Fabric send failed");
        }
    }

    /// Multicast an unsolicited binding announcement.
    pub(super) async fn announce_binding(&self, notify: AddressNotification) {
        debug!(
            eid = %notify.target,
            locator = %notify.locator,
            uri = URI_ADDRESS_NOTIFY,
            "Announcing binding"
        );
        self.send_frame(Destination::AllRouters, &notify.encode())
            .await;
    }
}
