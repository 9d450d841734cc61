//! Channel-backed sink used by the decode path.

use log::trace;
use rust_meshstat_common::{Error, Publication, TelemetrySink};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Hands publications to the publisher task without blocking.
///
/// Cloneable, and safe to call from any thread while the publisher runs.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Publication>,
}

impl ChannelSink {
    pub(crate) fn new(sender: mpsc::Sender<Publication>) -> Self {
        Self { sender }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&self, publication: Publication) -> Result<(), Error> {
        trace!("Queueing publication on {}", publication.topic);

        self.sender.try_send(publication).map_err(|e| match e {
            TrySendError::Full(p) => Error::Sink(format!("outbound queue full, dropped publication on {}", p.topic)),
            TrySendError::Closed(_) => Error::Sink("publisher is not running".into()),
        })
    }
}
