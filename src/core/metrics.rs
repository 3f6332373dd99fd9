//! Logger metrics for observability
//!
//! Counters for the operational side channel: routing outcomes, sink
//! failures, enrichment fallbacks and the broker publish path.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($(#[$doc:meta])* $name:ident => $record:ident),+ $(,)?) => {
        /// Atomic counters shared by the logger, its router and the broker sink
        ///
        /// # Example
        ///
        /// ```
        /// use rust_event_logger::LoggerMetrics;
        ///
        /// let metrics = LoggerMetrics::new();
        /// metrics.record_broker_dropped();
        /// metrics.record_broker_published();
        ///
        /// assert_eq!(metrics.broker_dropped(), 1);
        /// assert_eq!(metrics.broker_published(), 1);
        /// ```
        #[derive(Debug)]
        pub struct LoggerMetrics {
            $($(#[$doc])* $name: AtomicU64,)+
        }

        /// Point-in-time copy of every counter
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct MetricsSnapshot {
            $($(#[$doc])* pub $name: u64,)+
        }

        impl LoggerMetrics {
            /// Create a new metrics instance with all counters at zero
            pub const fn new() -> Self {
                Self {
                    $($name: AtomicU64::new(0),)+
                }
            }

            $(
                #[inline]
                pub fn $name(&self) -> u64 {
                    self.$name.load(Ordering::Relaxed)
                }

                /// Increment, returning the previous value
                #[inline]
                pub fn $record(&self) -> u64 {
                    self.$name.fetch_add(1, Ordering::Relaxed)
                }
            )+

            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($name: self.$name(),)+
                }
            }

            /// Reset all metrics to zero
            pub fn reset(&self) {
                $(self.$name.store(0, Ordering::Relaxed);)+
            }
        }
    };
}

counters! {
    /// Records handed to the router
    records_routed => record_routed,
    /// Successful sink deliveries
    deliveries => record_delivery,
    /// Sink skipped because the record was below its level
    filtered => record_filtered,
    /// Encode or write failures, panics included
    sink_failures => record_sink_failure,
    /// Records routed un-enriched because enrichment failed
    enrichment_fallbacks => record_enrichment_fallback,
    /// Broker records abandoned because no key could be derived
    key_failures => record_key_failure,
    /// Messages accepted by the broker client
    broker_published => record_broker_published,
    /// Messages the broker client failed to publish
    broker_errors => record_broker_error,
    /// Messages dropped on a full broker queue
    broker_dropped => record_broker_dropped,
}

impl LoggerMetrics {
    /// Share of broker messages dropped on a full queue (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing reached the broker path.
    pub fn broker_drop_rate(&self) -> f64 {
        let dropped = self.broker_dropped() as f64;
        let total = self.broker_published() as f64 + self.broker_errors() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
