//! The DocShare session: lifecycle of one two-party editing session.
//!
//! A [`DocShare`] owns at most one session at a time. It captures local
//! edits from a [`Document`], sends them through a [`Channel`], and applies
//! the peer's edits after running them through the session's
//! [`SyncStrategy`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use docshare_core::{DocumentDigest, Operation, PeerId};
use docshare_document::{subscribe, Document, EditListener, EditSubscription};
use docshare_sync::{
    codec, verify_convergence, Channel, ChannelEvent, ConvergenceResult, MessageLimits, Role,
    ShareMessage, StartMessage, StrategyKind, SyncError, SyncStrategy, UpdateMessage,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, ShareError};

/// Configuration for a [`DocShare`].
#[derive(Debug, Clone)]
pub struct ShareConfig {
    /// Conflict-resolution algorithm for new sessions.
    pub strategy: StrategyKind,
    /// Size limits applied to every message sent and received.
    pub limits: MessageLimits,
    /// Buffered events per subscriber before the slowest one starts lagging.
    pub event_capacity: usize,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            limits: MessageLimits::default(),
            event_capacity: 64,
        }
    }
}

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Initiator: Start sent, no reply yet. Receiver: Start received, no
    /// decision yet.
    PendingStart { role: Role },
    /// Both sides are exchanging edits.
    Sharing,
}

/// A share request waiting for the local user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOffer {
    pub from: PeerId,
    pub sender_name: String,
    pub file_name: String,
    /// The initiator's text with any updates received since the Start.
    pub document_text: String,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `stop_share` was called here.
    LocalStop,
    /// The receiver declined the request.
    Declined,
    /// The peer sent Stop.
    PeerStopped,
    /// The channel reported the peer gone.
    Disconnected,
    /// The peer sent an edit that did not fit the document.
    InvalidOperation,
}

/// Notifications about session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareEvent {
    /// A peer wants to share a document; call `accept_share` or
    /// `decline_share`.
    StartRequested(ShareOffer),
    /// A session began on this side.
    Started { other: PeerId, role: Role },
    /// Initiator only: the receiver's first update arrived.
    Confirmed { other: PeerId },
    /// A Start arrived while busy and was answered with Stop.
    Refused { peer: PeerId },
    /// The session is over.
    Ended { other: PeerId, reason: EndReason },
    /// A captured local edit could not be sent.
    SendFailed { peer: PeerId, error: String },
}

/// Identities fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Participants {
    our: PeerId,
    initiator: PeerId,
    receiver: PeerId,
}

impl Participants {
    fn role(&self) -> Role {
        if self.our == self.initiator {
            Role::Initiator
        } else {
            Role::Receiver
        }
    }

    fn other(&self) -> PeerId {
        match self.role() {
            Role::Initiator => self.receiver,
            Role::Receiver => self.initiator,
        }
    }
}

struct Offer {
    participants: Participants,
    sender_name: String,
    file_name: String,
    buffer: String,
    /// Updates applied to `buffer`.
    buffered: u64,
}

struct Live {
    participants: Participants,
    epoch: u64,
    document: Arc<dyn Document>,
    /// `None` while a remote edit is being written.
    capture: Option<EditSubscription>,
    strategy: Box<dyn SyncStrategy>,
    /// Receiver: always. Initiator: once the first update has arrived.
    confirmed: bool,
}

enum Phase {
    Idle,
    Offered(Offer),
    Live(Live),
}

impl Phase {
    fn other(&self) -> Option<PeerId> {
        match self {
            Phase::Idle => None,
            Phase::Offered(offer) => Some(offer.participants.initiator),
            Phase::Live(live) => Some(live.participants.other()),
        }
    }
}

struct Inner<C> {
    channel: C,
    config: ShareConfig,
    /// Lock order: `apply_gate`, then `outbound`, then `phase`.
    phase: Mutex<Phase>,
    outbound: Mutex<()>,
    apply_gate: Mutex<()>,
    epochs: AtomicU64,
    events: broadcast::Sender<ShareEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Two-party document sharing over a [`Channel`].
///
/// Cheap to clone; clones share the same session.
pub struct DocShare<C: Channel + 'static> {
    inner: Arc<Inner<C>>,
}

impl<C: Channel + 'static> Clone for DocShare<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Channel + 'static> fmt::Debug for DocShare<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocShare")
            .field("local", &self.inner.channel.local_peer_id())
            .field("state", &self.state())
            .finish()
    }
}

impl<C: Channel + 'static> DocShare<C> {
    /// Create an idle instance on `channel`.
    pub fn new(channel: C, config: ShareConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                channel,
                config,
                phase: Mutex::new(Phase::Idle),
                outbound: Mutex::new(()),
                apply_gate: Mutex::new(()),
                epochs: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.inner.channel
    }

    pub fn config(&self) -> &ShareConfig {
        &self.inner.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ShareEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local API
    // ─────────────────────────────────────────────────────────────────────────

    /// Offer `document` to `other`.
    ///
    /// Local edits are captured and sent from this moment on, before the
    /// receiver has answered. Without a display name, the short form of
    /// `our` is sent.
    pub fn start_share(
        &self,
        our: PeerId,
        display_name: Option<&str>,
        other: PeerId,
        file_name: &str,
        document: Arc<dyn Document>,
    ) -> Result<()> {
        if our == other {
            return Err(ShareError::InvalidArgument(
                "cannot share a document with ourselves".into(),
            ));
        }
        let local = self.inner.channel.local_peer_id();
        if our != local {
            return Err(ShareError::InvalidArgument(format!(
                "sharing as {our} over the channel of {local}"
            )));
        }

        let inner = &self.inner;
        let _outbound = lock(&inner.outbound);
        let (epoch, start) = {
            let mut phase = lock(&inner.phase);
            if !matches!(*phase, Phase::Idle) {
                return Err(ShareError::Busy);
            }

            let start = StartMessage {
                sender_id: our,
                sender_name: display_name
                    .map(str::to_owned)
                    .unwrap_or_else(|| our.short()),
                receiver_id: other,
                document_text: document.text(),
                file_name: file_name.to_owned(),
            };

            let epoch = inner.next_epoch();
            let capture = subscribe(&document, Inner::capture_listener(inner, epoch));
            *phase = Phase::Live(Live {
                participants: Participants {
                    our,
                    initiator: our,
                    receiver: other,
                },
                epoch,
                document,
                capture: Some(capture),
                strategy: inner.config.strategy.build(Role::Initiator),
                confirmed: false,
            });
            (epoch, start)
        };

        if let Err(e) = inner.send(&other, &ShareMessage::Start(start)) {
            warn!(peer = %other, error = %e, "failed to send start, abandoning share");
            let abandoned = inner.take_if(|phase| match phase {
                Phase::Live(live) => live.epoch == epoch,
                _ => false,
            });
            drop(abandoned);
            return Err(e);
        }

        info!(peer = %other, file = file_name, "share started");
        inner.emit(ShareEvent::Started {
            other,
            role: Role::Initiator,
        });
        Ok(())
    }

    /// End the current session, telling the peer.
    ///
    /// A pending request is declined. Does nothing when idle.
    pub fn stop_share(&self) -> Result<()> {
        let inner = &self.inner;
        let _outbound = lock(&inner.outbound);
        let previous = std::mem::replace(&mut *lock(&inner.phase), Phase::Idle);

        let (other, reason) = match &previous {
            Phase::Idle => return Ok(()),
            Phase::Offered(offer) => (offer.participants.initiator, EndReason::Declined),
            Phase::Live(live) => (live.participants.other(), EndReason::LocalStop),
        };
        // Detach capture before anything else can observe Idle.
        drop(previous);

        info!(peer = %other, ?reason, "share stopped locally");
        inner.emit(ShareEvent::Ended { other, reason });
        inner.send(&other, &ShareMessage::Stop)
    }

    /// Accept the pending request, loading the offered text into `document`.
    pub fn accept_share(&self, document: Arc<dyn Document>) -> Result<()> {
        let inner = &self.inner;
        let _gate = lock(&inner.apply_gate);

        let (epoch, other, snapshot) = {
            let mut phase = lock(&inner.phase);
            let offer = match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Offered(offer) => offer,
                other => {
                    *phase = other;
                    return Err(ShareError::NoPendingOffer);
                }
            };

            let epoch = inner.next_epoch();
            let other = offer.participants.initiator;
            let mut strategy = inner.config.strategy.build(Role::Receiver);
            strategy.skip_incoming(offer.buffered);
            *phase = Phase::Live(Live {
                participants: offer.participants,
                epoch,
                document: Arc::clone(&document),
                capture: None,
                strategy,
                confirmed: true,
            });
            (epoch, other, offer.buffer)
        };

        // Capture stays detached until the snapshot is in.
        let written = {
            let _resume = ResumeCapture { inner, epoch };
            document.replace(0, document.len_chars(), &snapshot)
        };
        if let Err(e) = written {
            warn!(peer = %other, error = %e, "could not load shared text, ending session");
            inner.end_session(epoch, EndReason::InvalidOperation);
            return Err(e.into());
        }

        info!(peer = %other, "share accepted");
        inner.emit(ShareEvent::Started {
            other,
            role: Role::Receiver,
        });
        Ok(())
    }

    /// Refuse the pending request.
    pub fn decline_share(&self) -> Result<()> {
        let inner = &self.inner;
        let _outbound = lock(&inner.outbound);
        let initiator = {
            let mut phase = lock(&inner.phase);
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Offered(offer) => offer.participants.initiator,
                other => {
                    *phase = other;
                    return Err(ShareError::NoPendingOffer);
                }
            }
        };

        info!(peer = %initiator, "share declined");
        inner.emit(ShareEvent::Ended {
            other: initiator,
            reason: EndReason::Declined,
        });
        inner.send(&initiator, &ShareMessage::Stop)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        match &*lock(&self.inner.phase) {
            Phase::Idle => SessionState::Idle,
            Phase::Offered(_) => SessionState::PendingStart {
                role: Role::Receiver,
            },
            Phase::Live(live) if !live.confirmed => SessionState::PendingStart {
                role: Role::Initiator,
            },
            Phase::Live(_) => SessionState::Sharing,
        }
    }

    /// True while edits are being captured: an accepted session, or one this
    /// side initiated.
    pub fn is_sharing(&self) -> bool {
        matches!(*lock(&self.inner.phase), Phase::Live(_))
    }

    /// The peer of the current session; `None` unless sharing.
    pub fn other_id(&self) -> Option<PeerId> {
        match &*lock(&self.inner.phase) {
            Phase::Live(live) => Some(live.participants.other()),
            _ => None,
        }
    }

    pub fn our_id(&self) -> Option<PeerId> {
        self.participants().map(|p| p.our)
    }

    pub fn initiator_id(&self) -> Option<PeerId> {
        self.participants().map(|p| p.initiator)
    }

    pub fn receiver_id(&self) -> Option<PeerId> {
        self.participants().map(|p| p.receiver)
    }

    /// Our role in the current or pending session.
    pub fn role(&self) -> Option<Role> {
        self.participants().map(|p| p.role())
    }

    pub fn is_initiator(&self) -> bool {
        self.role() == Some(Role::Initiator)
    }

    /// The request waiting for a decision, if any.
    pub fn pending_offer(&self) -> Option<ShareOffer> {
        match &*lock(&self.inner.phase) {
            Phase::Offered(offer) => Some(offer.to_event()),
            _ => None,
        }
    }

    /// The document being shared.
    pub fn document(&self) -> Option<Arc<dyn Document>> {
        match &*lock(&self.inner.phase) {
            Phase::Live(live) => Some(Arc::clone(&live.document)),
            _ => None,
        }
    }

    /// Local edits the peer has not yet acknowledged.
    pub fn outstanding(&self) -> Vec<Operation> {
        match &*lock(&self.inner.phase) {
            Phase::Live(live) => live.strategy.outstanding().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Digest of the shared document's current text.
    pub fn document_digest(&self) -> Option<DocumentDigest> {
        self.document().map(|doc| DocumentDigest::of(&doc.text()))
    }

    /// Compare the shared document against a digest reported by the peer.
    pub fn verify_convergence(&self, remote: &DocumentDigest) -> Option<ConvergenceResult> {
        self.document()
            .map(|doc| verify_convergence(&doc.text(), remote))
    }

    fn participants(&self) -> Option<Participants> {
        match &*lock(&self.inner.phase) {
            Phase::Idle => None,
            Phase::Offered(offer) => Some(offer.participants),
            Phase::Live(live) => Some(live.participants),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a payload received from `from`.
    pub fn handle_message(&self, from: &PeerId, payload: &[u8]) -> Result<()> {
        let message = match codec::decode(payload, &self.inner.config.limits) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %from, error = %e, "dropping undecodable message");
                return Err(e.into());
            }
        };
        debug!(peer = %from, kind = message.kind(), "received message");

        match message {
            ShareMessage::Start(start) => self.inner.handle_start(from, start),
            ShareMessage::Update(update) => self.inner.handle_update(from, update),
            ShareMessage::Stop => {
                self.inner.handle_stop(from);
                Ok(())
            }
        }
    }

    /// The channel reports `peer` gone. Ends any session with it.
    pub fn handle_disconnect(&self, peer: &PeerId) {
        self.inner.handle_disconnect(peer);
    }

    /// Handle one channel event.
    pub fn handle_event(&self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::Message { from, payload } => self.handle_message(&from, &payload),
            ChannelEvent::Disconnected(peer) => {
                self.handle_disconnect(&peer);
                Ok(())
            }
        }
    }

    /// Handle every event already queued on the channel, without waiting.
    ///
    /// Returns how many events were handled. Per-message errors are logged
    /// and do not stop the drain.
    pub fn pump(&self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.inner.channel.try_recv()? {
            if let Err(e) = self.handle_event(event) {
                debug!(error = %e, "event handling failed");
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Receive and handle channel events until the channel closes.
    pub async fn serve(&self) -> Result<()> {
        loop {
            match self.inner.channel.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle_event(event) {
                        debug!(error = %e, "event handling failed");
                    }
                }
                Err(SyncError::ChannelClosed) => {
                    info!("channel closed, leaving serve loop");
                    let other = lock(&self.inner.phase).other();
                    if let Some(other) = other {
                        self.inner.handle_disconnect(&other);
                    }
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Offer {
    fn to_event(&self) -> ShareOffer {
        ShareOffer {
            from: self.participants.initiator,
            sender_name: self.sender_name.clone(),
            file_name: self.file_name.clone(),
            document_text: self.buffer.clone(),
        }
    }

    /// Apply an update to the buffered snapshot.
    fn absorb(&mut self, op: &Operation, limits: &MessageLimits) -> Result<()> {
        op.apply_in_place(&mut self.buffer)?;
        self.buffered += 1;
        let chars = self.buffer.chars().count();
        if chars > limits.max_document_chars {
            return Err(SyncError::InvalidMessage(format!(
                "pending document grew to {chars} chars, limit is {}",
                limits.max_document_chars
            ))
            .into());
        }
        Ok(())
    }
}

impl Live {
    /// Check a remote edit against the document, then transform it.
    fn admit(&mut self, update: UpdateMessage) -> docshare_core::Result<Operation> {
        let len = self.document.len_chars();
        self.strategy.check_incoming(&update, len)?;
        let adjusted = self.strategy.transform_incoming(update);
        adjusted.check_bounds(len)?;
        Ok(adjusted)
    }
}

/// Outcome of an incoming update, decided under the phase lock.
enum Incoming {
    Ignored,
    Buffered,
    Apply {
        epoch: u64,
        document: Arc<dyn Document>,
        op: Operation,
        detached: Option<EditSubscription>,
        first: bool,
    },
    /// Dropped; the session carries on.
    Rejected(ShareError),
    /// Ends the pending request.
    EndOffer(ShareError),
    /// Ends live session `epoch`.
    EndSession { epoch: u64, error: ShareError },
}

impl<C: Channel + 'static> Inner<C> {
    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn emit(&self, event: ShareEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn send(&self, peer: &PeerId, message: &ShareMessage) -> Result<()> {
        let bytes = codec::encode(message, &self.config.limits)?;
        self.channel.send(peer, bytes)?;
        Ok(())
    }

    /// Replace the phase with Idle if `pred` holds, returning the old phase.
    fn take_if(&self, pred: impl FnOnce(&Phase) -> bool) -> Option<Phase> {
        let mut phase = lock(&self.phase);
        if pred(&phase) {
            Some(std::mem::replace(&mut *phase, Phase::Idle))
        } else {
            None
        }
    }

    fn capture_listener(this: &Arc<Self>, epoch: u64) -> EditListener {
        let weak: Weak<Self> = Arc::downgrade(this);
        Arc::new(move |op: &Operation| {
            if let Some(inner) = weak.upgrade() {
                inner.on_local_edit(epoch, op.clone());
            }
        })
    }

    fn on_local_edit(&self, epoch: u64, op: Operation) {
        let _outbound = lock(&self.outbound);
        let (peer, outgoing) = {
            let mut phase = lock(&self.phase);
            let Phase::Live(live) = &mut *phase else {
                return;
            };
            if live.epoch != epoch || op.is_noop() {
                return;
            }
            (live.participants.other(), live.strategy.register_outgoing(op))
        };

        debug!(peer = %peer, op = ?outgoing, "sending local edit");
        if let Err(e) = self.send(&peer, &ShareMessage::Update(outgoing)) {
            warn!(peer = %peer, error = %e, "failed to send local edit");
            self.emit(ShareEvent::SendFailed {
                peer,
                error: e.to_string(),
            });
        }
    }

    /// Re-attach capture after a remote write, unless the session moved on.
    fn resume_capture(this: &Arc<Self>, epoch: u64) {
        let mut phase = lock(&this.phase);
        if let Phase::Live(live) = &mut *phase {
            if live.epoch == epoch && live.capture.is_none() {
                live.capture = Some(subscribe(
                    &live.document,
                    Self::capture_listener(this, epoch),
                ));
            }
        }
    }

    fn handle_start(&self, from: &PeerId, start: StartMessage) -> Result<()> {
        if start.sender_id != *from {
            warn!(
                peer = %from,
                sender = %start.sender_id,
                "start sender does not match channel peer"
            );
            return Err(ShareError::Protocol {
                peer: *from,
                reason: format!("start claims sender {}", start.sender_id),
            });
        }
        let local = self.channel.local_peer_id();
        if start.receiver_id != local {
            warn!(peer = %from, receiver = %start.receiver_id, "start addressed to someone else");
            return Err(ShareError::Protocol {
                peer: *from,
                reason: format!("start addressed to {}", start.receiver_id),
            });
        }

        let offer = {
            let mut phase = lock(&self.phase);
            if matches!(*phase, Phase::Idle) {
                let offer = Offer {
                    participants: Participants {
                        our: start.receiver_id,
                        initiator: start.sender_id,
                        receiver: start.receiver_id,
                    },
                    sender_name: start.sender_name,
                    file_name: start.file_name,
                    buffer: start.document_text,
                    buffered: 0,
                };
                let event = offer.to_event();
                *phase = Phase::Offered(offer);
                Some(event)
            } else {
                None
            }
        };

        match offer {
            Some(offer) => {
                info!(peer = %from, file = %offer.file_name, "share requested");
                self.emit(ShareEvent::StartRequested(offer));
                Ok(())
            }
            None => {
                info!(peer = %from, "refusing share request: busy");
                let _outbound = lock(&self.outbound);
                self.emit(ShareEvent::Refused { peer: *from });
                self.send(from, &ShareMessage::Stop)
            }
        }
    }

    fn handle_update(self: &Arc<Self>, from: &PeerId, update: UpdateMessage) -> Result<()> {
        let _gate = lock(&self.apply_gate);

        let incoming = {
            let mut phase = lock(&self.phase);
            match &mut *phase {
                Phase::Idle => Incoming::Ignored,
                Phase::Offered(offer) if offer.participants.initiator != *from => {
                    Incoming::Rejected(ShareError::Protocol {
                        peer: *from,
                        reason: "update from a peer outside the session".into(),
                    })
                }
                Phase::Offered(offer) => {
                    match offer.absorb(&update.operation, &self.config.limits) {
                        Ok(()) => Incoming::Buffered,
                        Err(error) => Incoming::EndOffer(error),
                    }
                }
                Phase::Live(live) if live.participants.other() != *from => {
                    Incoming::Rejected(ShareError::Protocol {
                        peer: *from,
                        reason: "update from a peer outside the session".into(),
                    })
                }
                Phase::Live(live) => match live.admit(update) {
                    Ok(op) => {
                        let first = !live.confirmed;
                        live.confirmed = true;
                        Incoming::Apply {
                            epoch: live.epoch,
                            document: Arc::clone(&live.document),
                            op,
                            detached: live.capture.take(),
                            first,
                        }
                    }
                    Err(e) => Incoming::EndSession {
                        epoch: live.epoch,
                        error: e.into(),
                    },
                },
            }
        };

        match incoming {
            Incoming::Ignored => {
                debug!(peer = %from, "dropping update: no session");
                Ok(())
            }
            Incoming::Buffered => {
                debug!(peer = %from, "buffered update for pending request");
                Ok(())
            }
            Incoming::Rejected(e) => {
                warn!(peer = %from, error = %e, "dropping update");
                Err(e)
            }
            Incoming::EndOffer(e) => {
                warn!(peer = %from, error = %e, "invalid update for pending request, dropping it");
                self.end_offer(from, EndReason::InvalidOperation);
                Err(e)
            }
            Incoming::EndSession { epoch, error } => {
                warn!(peer = %from, error = %error, "invalid remote edit, ending session");
                self.end_session(epoch, EndReason::InvalidOperation);
                Err(error)
            }
            Incoming::Apply {
                epoch,
                document,
                op,
                detached,
                first,
            } => {
                drop(detached);
                let applied = {
                    let _resume = ResumeCapture { inner: self, epoch };
                    document.apply(&op)
                };
                if let Err(e) = applied {
                    warn!(peer = %from, error = %e, "document refused remote edit, ending session");
                    self.end_session(epoch, EndReason::InvalidOperation);
                    return Err(e.into());
                }
                if first {
                    info!(peer = %from, "share confirmed by receiver");
                    self.emit(ShareEvent::Confirmed { other: *from });
                }
                Ok(())
            }
        }
    }

    /// Tear down the live session `epoch` and send Stop to its peer.
    fn end_session(&self, epoch: u64, reason: EndReason) {
        let _outbound = lock(&self.outbound);
        let ended = self.take_if(|phase| match phase {
            Phase::Live(live) => live.epoch == epoch,
            _ => false,
        });
        let Some(Phase::Live(live)) = ended else {
            return;
        };
        let other = live.participants.other();
        drop(live);

        self.emit(ShareEvent::Ended { other, reason });
        if let Err(e) = self.send(&other, &ShareMessage::Stop) {
            debug!(peer = %other, error = %e, "could not send stop");
        }
    }

    /// Drop the pending request from `initiator` and send Stop.
    fn end_offer(&self, initiator: &PeerId, reason: EndReason) {
        let _outbound = lock(&self.outbound);
        let ended = self.take_if(|phase| {
            matches!(phase, Phase::Offered(offer) if offer.participants.initiator == *initiator)
        });
        if ended.is_none() {
            return;
        }

        self.emit(ShareEvent::Ended {
            other: *initiator,
            reason,
        });
        if let Err(e) = self.send(initiator, &ShareMessage::Stop) {
            debug!(peer = %initiator, error = %e, "could not send stop");
        }
    }

    fn handle_stop(&self, from: &PeerId) {
        let ended = self.take_if(|phase| phase.other() == Some(*from));
        match ended {
            Some(previous) => {
                drop(previous);
                info!(peer = %from, "peer stopped sharing");
                self.emit(ShareEvent::Ended {
                    other: *from,
                    reason: EndReason::PeerStopped,
                });
            }
            None => debug!(peer = %from, "ignoring stop outside a session"),
        }
    }

    fn handle_disconnect(&self, peer: &PeerId) {
        let _outbound = lock(&self.outbound);
        let Some(previous) = self.take_if(|phase| phase.other() == Some(*peer)) else {
            return;
        };
        let was_live = matches!(previous, Phase::Live(_));
        drop(previous);

        info!(peer = %peer, "peer disconnected, ending session");
        self.emit(ShareEvent::Ended {
            other: *peer,
            reason: EndReason::Disconnected,
        });
        if was_live {
            if let Err(e) = self.send(peer, &ShareMessage::Stop) {
                debug!(peer = %peer, error = %e, "could not send stop");
            }
        }
    }
}

/// Re-attaches edit capture when dropped, whether or not the write succeeded.
struct ResumeCapture<'a, C: Channel + 'static> {
    inner: &'a Arc<Inner<C>>,
    epoch: u64,
}

impl<C: Channel + 'static> Drop for ResumeCapture<'_, C> {
    fn drop(&mut self) {
        Inner::resume_capture(self.inner, self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshare_core::OperationError;
    use docshare_document::MemoryDocument;
    use docshare_sync::{MemoryChannel, MemoryNetwork};

    fn peer(byte: u8) -> PeerId {
        PeerId::from_bytes([byte; 32])
    }

    struct Pair {
        network: Arc<MemoryNetwork>,
        alice: DocShare<MemoryChannel>,
        bob: DocShare<MemoryChannel>,
    }

    fn pair() -> Pair {
        pair_with(ShareConfig::default())
    }

    fn pair_with(config: ShareConfig) -> Pair {
        let network = MemoryNetwork::new();
        let alice = DocShare::new(network.create_channel(peer(0xA1)), config.clone());
        let bob = DocShare::new(network.create_channel(peer(0xB0)), config);
        Pair {
            network,
            alice,
            bob,
        }
    }

    fn doc(text: &str) -> Arc<MemoryDocument> {
        Arc::new(MemoryDocument::new(text))
    }

    fn start(pair: &Pair, text: &str) -> Arc<MemoryDocument> {
        let document = doc(text);
        pair.alice
            .start_share(peer(0xA1), Some("alice"), peer(0xB0), "notes.txt", document.clone())
            .unwrap();
        document
    }

    #[test]
    fn test_start_share_moves_initiator_to_pending() {
        let pair = pair();
        start(&pair, "hello");

        assert_eq!(
            pair.alice.state(),
            SessionState::PendingStart {
                role: Role::Initiator
            }
        );
        assert!(pair.alice.is_sharing());
        assert!(pair.alice.is_initiator());
        assert_eq!(pair.alice.other_id(), Some(peer(0xB0)));
        assert_eq!(pair.alice.receiver_id(), Some(peer(0xB0)));
    }

    #[test]
    fn test_start_request_is_buffered_until_accepted() {
        let pair = pair();
        start(&pair, "hello");
        let mut events = pair.bob.subscribe_events();

        assert_eq!(pair.bob.pump().unwrap(), 1);

        let offer = pair.bob.pending_offer().unwrap();
        assert_eq!(offer.from, peer(0xA1));
        assert_eq!(offer.sender_name, "alice");
        assert_eq!(offer.file_name, "notes.txt");
        assert_eq!(offer.document_text, "hello");
        assert_eq!(
            pair.bob.state(),
            SessionState::PendingStart {
                role: Role::Receiver
            }
        );
        assert!(!pair.bob.is_sharing());
        assert_eq!(pair.bob.other_id(), None);
        assert_eq!(events.try_recv().unwrap(), ShareEvent::StartRequested(offer));
    }

    #[test]
    fn test_display_name_falls_back_to_short_id() {
        let pair = pair();
        pair.alice
            .start_share(peer(0xA1), None, peer(0xB0), "f", doc(""))
            .unwrap();
        pair.bob.pump().unwrap();
        assert_eq!(pair.bob.pending_offer().unwrap().sender_name, peer(0xA1).short());
    }

    #[test]
    fn test_accept_loads_snapshot_without_echo() {
        let pair = pair();
        start(&pair, "hello");
        pair.bob.pump().unwrap();

        let bob_doc = doc("stale");
        pair.bob.accept_share(bob_doc.clone()).unwrap();

        assert_eq!(bob_doc.text(), "hello");
        assert_eq!(pair.bob.state(), SessionState::Sharing);
        assert_eq!(bob_doc.listener_count(), 1);
        // Loading the snapshot sent nothing back.
        assert_eq!(pair.alice.pump().unwrap(), 0);
    }

    #[test]
    fn test_updates_while_pending_are_buffered() {
        let pair = pair();
        let alice_doc = start(&pair, "hello");
        alice_doc.replace(5, 0, "!").unwrap();
        pair.bob.pump().unwrap();

        assert_eq!(pair.bob.pending_offer().unwrap().document_text, "hello!");

        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();
        assert_eq!(bob_doc.text(), "hello!");
    }

    #[test]
    fn test_first_update_confirms_initiator() {
        let pair = pair();
        start(&pair, "hi");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();
        let mut events = pair.alice.subscribe_events();

        bob_doc.replace(2, 0, "!").unwrap();
        pair.alice.pump().unwrap();

        assert_eq!(pair.alice.state(), SessionState::Sharing);
        assert_eq!(
            events.try_recv().unwrap(),
            ShareEvent::Confirmed { other: peer(0xB0) }
        );
    }

    #[test]
    fn test_remote_edit_is_not_echoed() {
        let pair = pair();
        let alice_doc = start(&pair, "abc");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();

        alice_doc.replace(0, 1, "A").unwrap();
        assert_eq!(pair.bob.pump().unwrap(), 1);
        assert_eq!(bob_doc.text(), "Abc");

        // Applying the remote edit produced no outgoing update.
        assert_eq!(pair.alice.pump().unwrap(), 0);
        assert_eq!(bob_doc.listener_count(), 1);
        assert!(pair.bob.outstanding().is_empty());
    }

    #[test]
    fn test_start_while_busy_is_refused_once() {
        let pair = pair();
        start(&pair, "x");
        pair.bob.pump().unwrap();
        pair.bob.accept_share(doc("")).unwrap();

        let carol = DocShare::new(
            pair.network.create_channel(peer(0xC0)),
            ShareConfig::default(),
        );
        carol
            .start_share(peer(0xC0), None, peer(0xB0), "other", doc("c"))
            .unwrap();

        let mut events = pair.bob.subscribe_events();
        pair.bob.pump().unwrap();

        assert_eq!(events.try_recv().unwrap(), ShareEvent::Refused { peer: peer(0xC0) });
        assert_eq!(pair.bob.other_id(), Some(peer(0xA1)));
        assert_eq!(pair.bob.state(), SessionState::Sharing);

        assert_eq!(carol.pump().unwrap(), 1);
        assert_eq!(carol.state(), SessionState::Idle);
    }

    #[test]
    fn test_decline_returns_both_to_idle() {
        let pair = pair();
        let alice_doc = start(&pair, "x");
        pair.bob.pump().unwrap();

        pair.bob.decline_share().unwrap();
        assert_eq!(pair.bob.state(), SessionState::Idle);

        pair.alice.pump().unwrap();
        assert_eq!(pair.alice.state(), SessionState::Idle);
        assert_eq!(alice_doc.listener_count(), 0);
    }

    #[test]
    fn test_decline_without_offer_fails() {
        let pair = pair();
        assert!(matches!(
            pair.bob.decline_share(),
            Err(ShareError::NoPendingOffer)
        ));
        assert!(matches!(
            pair.bob.accept_share(doc("")),
            Err(ShareError::NoPendingOffer)
        ));
    }

    #[test]
    fn test_start_while_busy_fails_locally() {
        let pair = pair();
        start(&pair, "x");
        let err = pair
            .alice
            .start_share(peer(0xA1), None, peer(0xB0), "again", doc(""))
            .unwrap_err();
        assert!(matches!(err, ShareError::Busy));
    }

    #[test]
    fn test_start_to_unreachable_peer_rolls_back() {
        let pair = pair();
        let document = doc("x");
        let err = pair
            .alice
            .start_share(peer(0xA1), None, peer(0xEE), "f", document.clone())
            .unwrap_err();

        assert!(matches!(err, ShareError::Sync(SyncError::PeerNotConnected(_))));
        assert_eq!(pair.alice.state(), SessionState::Idle);
        assert_eq!(document.listener_count(), 0);
    }

    #[test]
    fn test_stop_share_detaches_and_notifies_peer() {
        let pair = pair();
        let alice_doc = start(&pair, "x");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();

        pair.alice.stop_share().unwrap();
        assert_eq!(pair.alice.state(), SessionState::Idle);
        assert_eq!(pair.alice.other_id(), None);
        assert_eq!(alice_doc.listener_count(), 0);

        pair.bob.pump().unwrap();
        assert_eq!(pair.bob.state(), SessionState::Idle);
        assert_eq!(bob_doc.listener_count(), 0);

        // Idle stop is a no-op.
        pair.alice.stop_share().unwrap();
    }

    #[test]
    fn test_update_from_third_party_is_rejected() {
        let pair = pair();
        start(&pair, "x");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();

        let payload = codec::encode(
            &ShareMessage::Update(Operation::insert(0, "!").into()),
            &MessageLimits::default(),
        )
        .unwrap();
        let err = pair.bob.handle_message(&peer(0xC0), &payload).unwrap_err();

        assert!(err.is_protocol_error());
        assert_eq!(bob_doc.text(), "x");
        assert_eq!(pair.bob.state(), SessionState::Sharing);
    }

    #[test]
    fn test_garbage_is_a_protocol_error() {
        let pair = pair();
        let err = pair.bob.handle_message(&peer(0xA1), b"\xff\x00").unwrap_err();
        assert!(err.is_protocol_error());
        assert_eq!(pair.bob.state(), SessionState::Idle);
    }

    #[test]
    fn test_out_of_bounds_update_ends_session() {
        let pair = pair();
        start(&pair, "abc");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();
        let mut events = pair.bob.subscribe_events();

        let payload = codec::encode(
            &ShareMessage::Update(Operation::delete(2, 10).into()),
            &MessageLimits::default(),
        )
        .unwrap();
        let err = pair.bob.handle_message(&peer(0xA1), &payload).unwrap_err();

        assert!(matches!(err, ShareError::InvalidOperation(_)));
        assert_eq!(bob_doc.text(), "abc");
        assert_eq!(pair.bob.state(), SessionState::Idle);
        assert_eq!(
            events.try_recv().unwrap(),
            ShareEvent::Ended {
                other: peer(0xA1),
                reason: EndReason::InvalidOperation
            }
        );

        pair.alice.pump().unwrap();
        assert_eq!(pair.alice.state(), SessionState::Idle);
    }

    #[test]
    fn test_far_out_position_with_outstanding_edit_ends_session() {
        let pair = pair();
        start(&pair, "abc");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();
        bob_doc.replace(0, 0, "ab").unwrap();
        assert_eq!(pair.bob.outstanding(), vec![Operation::insert(0, "ab")]);

        let payload = codec::encode(
            &ShareMessage::Update(UpdateMessage::new(Operation::insert(usize::MAX, "Z"), 1, 0)),
            &MessageLimits::default(),
        )
        .unwrap();
        let err = pair.bob.handle_message(&peer(0xA1), &payload).unwrap_err();

        assert!(matches!(err, ShareError::InvalidOperation(_)));
        assert_eq!(bob_doc.text(), "ababc");
        assert_eq!(pair.bob.state(), SessionState::Idle);
        assert_eq!(bob_doc.listener_count(), 0);
    }

    #[test]
    fn test_update_checked_against_text_peer_had() {
        let pair = pair();
        start(&pair, "abc");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();
        bob_doc.replace(3, 0, "de").unwrap();

        // Alice has not seen "de": her text is still "abc", so 4 is past its end.
        let payload = codec::encode(
            &ShareMessage::Update(UpdateMessage::new(Operation::insert(4, "Z"), 1, 0)),
            &MessageLimits::default(),
        )
        .unwrap();
        let err = pair.bob.handle_message(&peer(0xA1), &payload).unwrap_err();

        assert!(matches!(
            err,
            ShareError::InvalidOperation(OperationError::OutOfBounds { len: 3, .. })
        ));
        assert_eq!(bob_doc.text(), "abcde");
    }

    #[test]
    fn test_stale_epoch_does_not_end_new_session() {
        let pair = pair();
        start(&pair, "x");
        let epoch = |share: &DocShare<MemoryChannel>| match &*lock(&share.inner.phase) {
            Phase::Live(live) => live.epoch,
            _ => panic!("no live session"),
        };
        let first = epoch(&pair.alice);

        pair.alice.stop_share().unwrap();
        pair.bob.pump().unwrap();
        start(&pair, "y");
        let second = epoch(&pair.alice);
        assert_ne!(first, second);

        pair.alice
            .inner
            .end_session(first, EndReason::InvalidOperation);
        assert!(pair.alice.is_sharing());
        assert_eq!(epoch(&pair.alice), second);
    }

    #[test]
    fn test_pending_buffer_is_held_to_document_limit() {
        let mut config = ShareConfig::default();
        config.limits.max_document_chars = 4;
        let pair = pair_with(config);
        start(&pair, "abc");
        pair.bob.pump().unwrap();
        let mut events = pair.bob.subscribe_events();

        let grow = |op: Operation| {
            let payload =
                codec::encode(&ShareMessage::Update(op.into()), &MessageLimits::default())
                    .unwrap();
            pair.bob.handle_message(&peer(0xA1), &payload)
        };
        grow(Operation::insert(3, "d")).unwrap();
        assert_eq!(pair.bob.pending_offer().unwrap().document_text, "abcd");

        let err = grow(Operation::insert(4, "e")).unwrap_err();
        assert!(matches!(err, ShareError::Sync(SyncError::InvalidMessage(_))));
        assert_eq!(pair.bob.state(), SessionState::Idle);
        assert_eq!(
            events.try_recv().unwrap(),
            ShareEvent::Ended {
                other: peer(0xA1),
                reason: EndReason::InvalidOperation
            }
        );

        pair.alice.pump().unwrap();
        assert_eq!(pair.alice.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_share_as_another_peer_is_rejected() {
        let pair = pair();
        let document = doc("x");
        let err = pair
            .alice
            .start_share(peer(0xC0), None, peer(0xB0), "f", document.clone())
            .unwrap_err();

        assert!(matches!(err, ShareError::InvalidArgument(_)));
        assert_eq!(pair.alice.state(), SessionState::Idle);
        assert_eq!(document.listener_count(), 0);
        assert_eq!(pair.bob.pump().unwrap(), 0);
    }

    #[test]
    fn test_disconnect_ends_session() {
        let pair = pair();
        let alice_doc = start(&pair, "x");
        pair.network.disconnect(&peer(0xB0));

        pair.alice.pump().unwrap();
        assert_eq!(pair.alice.state(), SessionState::Idle);
        assert_eq!(alice_doc.listener_count(), 0);
    }

    #[test]
    fn test_digest_matches_after_sync() {
        let pair = pair();
        let alice_doc = start(&pair, "hello");
        pair.bob.pump().unwrap();
        pair.bob.accept_share(doc("")).unwrap();
        alice_doc.replace(5, 0, " world").unwrap();
        pair.bob.pump().unwrap();

        let digest = pair.alice.document_digest().unwrap();
        assert!(pair.bob.verify_convergence(&digest).unwrap().is_converged());
    }

    #[tokio::test]
    async fn test_serve_applies_updates() {
        let pair = pair();
        let alice_doc = start(&pair, "ab");
        pair.bob.pump().unwrap();
        let bob_doc = doc("");
        pair.bob.accept_share(bob_doc.clone()).unwrap();

        let bob = pair.bob.clone();
        let server = tokio::spawn(async move { bob.serve().await });

        alice_doc.replace(2, 0, "c").unwrap();
        for _ in 0..100 {
            if bob_doc.text() == "abc" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(bob_doc.text(), "abc");

        pair.network.disconnect(&peer(0xB0));
        server.await.unwrap().unwrap();
        assert_eq!(pair.bob.state(), SessionState::Idle);
    }
}
