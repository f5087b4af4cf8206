//! src/runner/channel.rs
//!
//! A point-to-point, bidirectional message connection between the
//! coordinator and one worker.
//!
//! Each endpoint sends values of one type and receives values of the
//! other. Delivery within a pair is in-order and reliable; nothing is
//! shared between different pairs. Dropping an endpoint closes both of
//! its halves, which the peer observes as a disconnect.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// One endpoint of a duplex connection: sends `S`, receives `R`.
#[derive(Debug)]
pub struct Duplex<S, R> {
    tx: Sender<S>,
    rx: Receiver<R>,
}

/// Creates a connected pair of endpoints with `capacity` buffered
/// messages in each direction. The first endpoint sends `A` and
/// receives `B`; the second is its mirror image.
pub fn duplex<A, B>(capacity: usize) -> (Duplex<A, B>, Duplex<B, A>) {
    let (a_tx, a_rx) = bounded(capacity);
    let (b_tx, b_rx) = bounded(capacity);
    (
        Duplex { tx: a_tx, rx: b_rx },
        Duplex { tx: b_tx, rx: a_rx },
    )
}

impl<S, R> Duplex<S, R> {
    /// Sends a message, blocking while the buffer is full. Fails when
    /// the peer endpoint is gone.
    pub fn send(&self, message: S) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow!("Peer endpoint disconnected"))
    }

    /// Receives a message, blocking until one is available. Fails when
    /// the peer endpoint is gone and the buffer is drained.
    pub fn recv(&self) -> Result<R> {
        self.rx
            .recv()
            .map_err(|_| anyhow!("Peer endpoint disconnected"))
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> std::result::Result<R, TryRecvError> {
        self.rx.try_recv()
    }

    /// Non-blocking readiness check; does not consume the message.
    pub fn poll(&self) -> bool {
        !self.rx.is_empty()
    }

    /// The receive side, for registering with a `Select`.
    pub fn receiver(&self) -> &Receiver<R> {
        &self.rx
    }
}
