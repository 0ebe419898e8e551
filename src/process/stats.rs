// Processing metrics.
//
// Plain atomic counters shared by every processor clone; readable at any
// time without stopping the pools.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters over the event and execution paths.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    events_ingested: AtomicU64,
    transactions_executed: AtomicU64,
    exec_reports: AtomicU64,
    cancel_rejects: AtomicU64,
    business_rejects: AtomicU64,
}

/// Point-in-time snapshot of the processing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorCounters {
    pub events_ingested: u64,
    pub transactions_executed: u64,
    pub exec_reports: u64,
    pub cancel_rejects: u64,
    pub business_rejects: u64,
}

impl ProcessorCounters {
    /// Every outbound event produced so far.
    pub fn outputs(&self) -> u64 {
        self.exec_reports + self.cancel_rejects + self.business_rejects
    }
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_event_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_executed(&self) {
        self.transactions_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exec_report(&self) {
        self.exec_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancel_reject(&self) {
        self.cancel_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_business_reject(&self) {
        self.business_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorCounters {
        ProcessorCounters {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            transactions_executed: self.transactions_executed.load(Ordering::Relaxed),
            exec_reports: self.exec_reports.load(Ordering::Relaxed),
            cancel_rejects: self.cancel_rejects.load(Ordering::Relaxed),
            business_rejects: self.business_rejects.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ProcessorStats::new();
        stats.record_event_ingested();
        stats.record_event_ingested();
        stats.record_transaction_executed();
        stats.record_exec_report();
        stats.record_business_reject();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_ingested, 2);
        assert_eq!(snapshot.transactions_executed, 1);
        assert_eq!(snapshot.outputs(), 2);
    }
}
