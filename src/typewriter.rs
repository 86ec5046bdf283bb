//! The typing effect.
//!
//! Replies arrive in bursts; the typewriter reveals them at an even pace.  A single task owns the
//! character queue and moves through [`Phase::Idle`], [`Phase::Streaming`] and
//! [`Phase::Draining`].  Text reaches it over a channel ([`TypewriterFeed`]) and one character
//! leaves per tick.  Completion is noticed the moment the queue empties after the feed finished,
//! so there is no separate poll.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::observability::TYPEWRITER_CHARS;

/// Interval between two revealed characters.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// What the producer sends to the typewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypewriterEvent {
    /// More reply text.
    Chunk(String),
    /// The reply is complete; drain what is queued and stop.
    Done,
}

/// The typewriter's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing received yet.
    Idle,
    /// Receiving chunks and revealing characters.
    Streaming,
    /// The feed finished; revealing whatever is left.
    Draining,
}

/// Why the typewriter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypewriterStop {
    /// Every received character was revealed.
    Finished,
    /// Halted by the cancellation token; queued characters were discarded.
    Cancelled,
}

/// Summary of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypewriterReport {
    /// How the run ended.
    pub stop: TypewriterStop,
    /// Characters handed to the sink.
    pub revealed: usize,
    /// Characters still queued when the run was cancelled.
    pub dropped: usize,
}

/// Producer side of the typewriter channel.
#[derive(Debug, Clone)]
pub struct TypewriterFeed {
    tx: mpsc::UnboundedSender<TypewriterEvent>,
}

impl TypewriterFeed {
    /// Queue a chunk of text.  A feed whose typewriter is gone silently discards.
    pub fn push(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.tx.send(TypewriterEvent::Chunk(text.to_string()));
    }

    /// Signal that no more text follows.
    pub fn finish(&self) {
        let _ = self.tx.send(TypewriterEvent::Done);
    }
}

/// Create a connected feed and event receiver.
pub fn channel() -> (TypewriterFeed, mpsc::UnboundedReceiver<TypewriterEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TypewriterFeed { tx }, rx)
}

/// Reveals queued text one character per tick.
#[derive(Debug, Clone, Copy)]
pub struct Typewriter {
    tick: Duration,
}

impl Default for Typewriter {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl Typewriter {
    /// A typewriter revealing one character every `tick`.  A zero tick is raised to one
    /// millisecond.
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// The reveal interval.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Drain `events` into `sink` until the feed is done and the queue is empty, or until
    /// `cancel` fires.
    ///
    /// After cancellation `sink` is never called again.  A feed dropped without
    /// [`TypewriterEvent::Done`] is treated as finished.
    pub async fn run<F>(
        &self,
        mut events: mpsc::UnboundedReceiver<TypewriterEvent>,
        mut sink: F,
        cancel: &CancellationToken,
    ) -> TypewriterReport
    where
        F: FnMut(char),
    {
        let mut phase = Phase::Idle;
        let mut queue: VecDeque<char> = VecDeque::new();
        let mut revealed = 0;
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if phase == Phase::Draining && queue.is_empty() {
                tracing::debug!(revealed, "typewriter finished");
                return TypewriterReport {
                    stop: TypewriterStop::Finished,
                    revealed,
                    dropped: 0,
                };
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(revealed, dropped = queue.len(), "typewriter cancelled");
                    return TypewriterReport {
                        stop: TypewriterStop::Cancelled,
                        revealed,
                        dropped: queue.len(),
                    };
                }
                event = events.recv(), if phase != Phase::Draining => match event {
                    Some(TypewriterEvent::Chunk(text)) => {
                        phase = Phase::Streaming;
                        queue.extend(text.chars());
                    }
                    Some(TypewriterEvent::Done) => phase = Phase::Draining,
                    None => {
                        tracing::debug!("typewriter feed dropped without completion");
                        phase = Phase::Draining;
                    }
                },
                _ = ticker.tick(), if !queue.is_empty() => {
                    if let Some(c) = queue.pop_front() {
                        sink(c);
                        revealed += 1;
                        TYPEWRITER_CHARS.click();
                    }
                }
            }
        }
    }
}
