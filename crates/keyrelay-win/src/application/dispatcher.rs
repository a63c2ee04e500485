//! Multi-delegate dispatch: one occurrence in, one aggregated answer out.
//!
//! Every composed key is offered to all registered delegates. Each delegate
//! receives a [`Responder`] and must eventually call
//! [`Responder::respond`] exactly once, from any thread, at any time. The
//! dispatcher ORs the `handled` flags and, when the last delegate has
//! answered, invokes the occurrence's completion callback exactly once.
//!
//! # How answers get back to the pump (for beginners)
//!
//! Delegates may answer from another thread (a framework isolate, a tokio
//! task), but the pending table is owned by the message pump and must only be
//! touched there. So a responder never touches the table: it sends a
//! [`DelegateAnswer`] into an unbounded `tokio::sync::mpsc` channel. The pump
//! drains that channel before handling each native message and right after
//! each fan-out ([`KeyDispatcher::drain_answers`]), or waits for the next
//! answer asynchronously ([`KeyDispatcher::wait_for_answer`]).
//!
//! Because the channel is unbounded, answering never blocks the answering
//! thread, and because only the pump applies answers, the pending state needs
//! no locks.

use std::collections::VecDeque;

use keyrelay_core::ComposedKey;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::channel::ChannelDelegate;
use super::embedder::EmbedderDelegate;

// ── Answers and responders ────────────────────────────────────────────────────

/// One delegate's answer as it travels back to the pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateAnswer {
    pub sequence_id: u64,
    pub handled: bool,
    /// The delegate asked for the occurrence never to be redispatched.
    pub suppress_redispatch: bool,
}

/// Single-use answer handle given to a delegate for one occurrence.
///
/// `respond` consumes the responder, so a delegate cannot answer twice.
/// Dropping a responder without answering leaves the occurrence pending
/// forever; a warning is logged when that happens.
#[derive(Debug)]
pub struct Responder {
    sequence_id: u64,
    suppress_redispatch: bool,
    tx: UnboundedSender<DelegateAnswer>,
    answered: bool,
}

impl Responder {
    fn new(sequence_id: u64, tx: UnboundedSender<DelegateAnswer>) -> Self {
        Self {
            sequence_id,
            suppress_redispatch: false,
            tx,
            answered: false,
        }
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Marks the occurrence as one that must never be redispatched, whatever
    /// the aggregated answer turns out to be.
    pub fn never_redispatch(mut self) -> Self {
        self.suppress_redispatch = true;
        self
    }

    /// Delivers this delegate's answer.
    pub fn respond(mut self, handled: bool) {
        self.answered = true;
        let answer = DelegateAnswer {
            sequence_id: self.sequence_id,
            handled,
            suppress_redispatch: self.suppress_redispatch,
        };
        if self.tx.send(answer).is_err() {
            debug!(
                sequence_id = self.sequence_id,
                "dispatcher gone, dropping delegate answer"
            );
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if !self.answered {
            warn!(
                sequence_id = self.sequence_id,
                "responder dropped without an answer; occurrence stays pending"
            );
        }
    }
}

// ── Pending events ────────────────────────────────────────────────────────────

/// The aggregated outcome handed to a completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub sequence_id: u64,
    /// At least one delegate handled the occurrence.
    pub handled: bool,
    /// At least one delegate asked never to redispatch it.
    pub suppress_redispatch: bool,
}

/// Called exactly once per dispatched occurrence, on the pump.
pub type CompletionCallback = Box<dyn FnOnce(Resolution)>;

struct PendingEvent {
    sequence_id: u64,
    unreplied: usize,
    any_handled: bool,
    suppress_redispatch: bool,
    completion: Option<CompletionCallback>,
}

// ── Delegates ─────────────────────────────────────────────────────────────────

/// A consumer of composed keys that answers through a [`Responder`].
pub trait KeyHandlerDelegate {
    fn handle_key(&mut self, key: &ComposedKey, responder: Responder);
}

/// The delegates a pipeline can be configured with.
pub enum KeyDelegate {
    /// Normalized key events for the framework's key event stream.
    Embedder(EmbedderDelegate),
    /// The legacy JSON key channel.
    Channel(ChannelDelegate),
}

impl KeyHandlerDelegate for KeyDelegate {
    fn handle_key(&mut self, key: &ComposedKey, responder: Responder) {
        match self {
            KeyDelegate::Embedder(delegate) => delegate.handle_key(key, responder),
            KeyDelegate::Channel(delegate) => delegate.handle_key(key, responder),
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Fans each occurrence out to every delegate and joins the answers.
pub struct KeyDispatcher<D: KeyHandlerDelegate = KeyDelegate> {
    delegates: Vec<D>,
    pending: VecDeque<PendingEvent>,
    answer_tx: UnboundedSender<DelegateAnswer>,
    answer_rx: UnboundedReceiver<DelegateAnswer>,
    backlog_warning_threshold: usize,
}

impl<D: KeyHandlerDelegate> KeyDispatcher<D> {
    pub fn new(delegates: Vec<D>, backlog_warning_threshold: usize) -> Self {
        let (answer_tx, answer_rx) = mpsc::unbounded_channel();
        Self {
            delegates,
            pending: VecDeque::new(),
            answer_tx,
            answer_rx,
            backlog_warning_threshold,
        }
    }

    pub fn delegates(&self) -> &[D] {
        &self.delegates
    }

    /// Occurrences still waiting for at least one answer.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Offers `key` to every delegate.
    ///
    /// With no delegates the completion runs immediately as unhandled.
    /// Answers given synchronously by a delegate are applied before this
    /// returns.
    pub fn dispatch(&mut self, key: ComposedKey, completion: CompletionCallback) {
        let sequence_id = key.sequence_id();
        if self.delegates.is_empty() {
            completion(Resolution {
                sequence_id,
                handled: false,
                suppress_redispatch: false,
            });
            return;
        }

        self.pending.push_back(PendingEvent {
            sequence_id,
            unreplied: self.delegates.len(),
            any_handled: false,
            suppress_redispatch: false,
            completion: Some(completion),
        });
        if self.pending.len() > self.backlog_warning_threshold {
            warn!(
                pending = self.pending.len(),
                threshold = self.backlog_warning_threshold,
                "delegate answers are falling behind"
            );
        }

        for delegate in &mut self.delegates {
            let responder = Responder::new(sequence_id, self.answer_tx.clone());
            delegate.handle_key(&key, responder);
        }
        self.drain_answers();
    }

    /// Applies every answer already in the channel. Returns how many.
    pub fn drain_answers(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.answer_rx.try_recv() {
                Ok(answer) => {
                    self.apply_answer(answer);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Waits for the next answer and applies it.
    ///
    /// Returns `false` at once when nothing is pending, since every valid
    /// answer belongs to a pending occurrence.
    pub async fn wait_for_answer(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        match self.answer_rx.recv().await {
            Some(answer) => {
                self.apply_answer(answer);
                true
            }
            None => false,
        }
    }

    /// # Panics
    ///
    /// On an answer for a sequence id that is not pending. That means a
    /// delegate answered an occurrence twice or invented an id, and the
    /// exactly-once guarantee is already broken.
    fn apply_answer(&mut self, answer: DelegateAnswer) {
        let index = self
            .pending
            .iter()
            .position(|p| p.sequence_id == answer.sequence_id)
            .unwrap_or_else(|| {
                panic!(
                    "delegate answered unknown sequence id {}",
                    answer.sequence_id
                )
            });

        let entry = &mut self.pending[index];
        assert!(
            entry.unreplied > 0,
            "pending event {} has no outstanding replies",
            entry.sequence_id
        );
        entry.unreplied -= 1;
        entry.any_handled |= answer.handled;
        entry.suppress_redispatch |= answer.suppress_redispatch;
        if entry.unreplied > 0 {
            return;
        }

        let Some(mut finished) = self.pending.remove(index) else {
            return;
        };
        let resolution = Resolution {
            sequence_id: finished.sequence_id,
            handled: finished.any_handled,
            suppress_redispatch: finished.suppress_redispatch,
        };
        debug!(
            sequence_id = resolution.sequence_id,
            handled = resolution.handled,
            "occurrence resolved"
        );
        if let Some(completion) = finished.completion.take() {
            completion(resolution);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
