//! Recoverable-fault accumulation
//!
//! The sink replaces the null-object sentinel of the original design: any
//! component that observes a recoverable data-consistency condition
//! records a [`Fault`] here and abandons the mutation, leaving tree state
//! unchanged. The external alerting layer drains the receiver.

use canopy_errors::Fault;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Cloneable handle recording faults onto the outbound error queue
#[derive(Debug, Clone)]
pub struct FaultSink {
    tx: Sender<Fault>,
}

impl FaultSink {
    /// Create a sink and the receiver its faults drain from
    pub fn channel() -> (FaultSink, Receiver<Fault>) {
        let (tx, rx) = unbounded();
        (FaultSink { tx }, rx)
    }

    /// Record one fault
    ///
    /// A dropped consumer is tolerated; the fault is still logged.
    pub fn record(&self, fault: Fault) {
        tracing::warn!(fault = %fault, "recoverable fault");
        if self.tx.send(fault).is_err() {
            tracing::debug!("fault consumer gone, fault dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_errors::FaultKind;

    #[test]
    fn test_record_delivers() {
        let (sink, rx) = FaultSink::channel();
        sink.record(Fault::new(FaultKind::FindNotFound).with_message("nothing"));
        let fault = rx.recv().unwrap();
        assert_eq!(fault.kind, FaultKind::FindNotFound);
    }

    #[test]
    fn test_record_survives_dropped_consumer() {
        let (sink, rx) = FaultSink::channel();
        drop(rx);
        sink.record(Fault::new(FaultKind::PropertyNotFound));
    }
}
