//! Run statistics folded from routing events

use std::fmt;

use meridian_core::{DropReason, ForwardMode, RoutingEvent};
use serde::{Deserialize, Serialize};

/// Drops by reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub malformed: u64,
    pub no_route: u64,
    pub search_timeout: u64,
    pub queue_overflow: u64,
    pub queue_expired: u64,
    pub ttl_expired: u64,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::Malformed => &mut self.malformed,
            DropReason::NoRoute => &mut self.no_route,
            DropReason::SearchTimeout => &mut self.search_timeout,
            DropReason::QueueOverflow => &mut self.queue_overflow,
            DropReason::QueueExpired => &mut self.queue_expired,
            DropReason::TtlExpired => &mut self.ttl_expired,
        };
        *counter += 1;
    }

    pub fn total(&self) -> u64 {
        self.malformed
            + self.no_route
            + self.search_timeout
            + self.queue_overflow
            + self.queue_expired
            + self.ttl_expired
    }
}

/// Simulation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimStats {
    /// Data packets originated
    pub packets_sent: u64,
    pub packets_delivered: u64,
    /// Sum of hop counts of delivered packets
    pub total_hops: u64,
    pub packets_deferred: u64,
    pub drops: DropCounts,
    /// Transmissions by forwarding mode (data and directory traffic)
    pub direct_hops: u64,
    pub greedy_hops: u64,
    pub recovery_hops: u64,
    pub queries_issued: u64,
    pub searches_timed_out: u64,
    pub locations_resolved: u64,
    pub neighbors_lost: u64,
    /// Sum and count of oracle-measured location errors
    pub location_error_sum: f64,
    pub location_error_samples: u64,
}

impl SimStats {
    pub fn record(&mut self, event: &RoutingEvent) {
        match event {
            RoutingEvent::Originated { .. } => self.packets_sent += 1,
            RoutingEvent::Forwarded { mode, .. } => match mode {
                ForwardMode::Direct => self.direct_hops += 1,
                ForwardMode::Greedy => self.greedy_hops += 1,
                ForwardMode::Recovery => self.recovery_hops += 1,
            },
            RoutingEvent::Deferred { .. } => self.packets_deferred += 1,
            RoutingEvent::Delivered { hops, .. } => {
                self.packets_delivered += 1;
                self.total_hops += u64::from(*hops);
            }
            RoutingEvent::Dropped { reason, .. } => self.drops.record(*reason),
            RoutingEvent::QueryIssued { .. } => self.queries_issued += 1,
            RoutingEvent::SearchTimedOut { .. } => self.searches_timed_out += 1,
            RoutingEvent::LocationResolved { error, .. } => {
                self.locations_resolved += 1;
                if let Some(error) = error {
                    self.location_error_sum += error;
                    self.location_error_samples += 1;
                }
            }
            RoutingEvent::NeighborLost { .. } => self.neighbors_lost += 1,
        }
    }

    /// Fraction of originated packets that were delivered
    pub fn delivery_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_delivered as f64 / self.packets_sent as f64
    }

    pub fn mean_hops(&self) -> Option<f64> {
        (self.packets_delivered > 0).then(|| self.total_hops as f64 / self.packets_delivered as f64)
    }

    pub fn mean_location_error(&self) -> Option<f64> {
        (self.location_error_samples > 0)
            .then(|| self.location_error_sum / self.location_error_samples as f64)
    }
}

impl fmt::Display for SimStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Packets sent:        {}", self.packets_sent)?;
        writeln!(
            f,
            "  Packets delivered:   {} ({:.1}%)",
            self.packets_delivered,
            self.delivery_ratio() * 100.0
        )?;
        if let Some(hops) = self.mean_hops() {
            writeln!(f, "  Mean hops:           {:.2}", hops)?;
        }
        writeln!(
            f,
            "  Hops by mode:        direct {}, greedy {}, recovery {}",
            self.direct_hops, self.greedy_hops, self.recovery_hops
        )?;
        writeln!(f, "  Deferred:            {}", self.packets_deferred)?;
        writeln!(
            f,
            "  Drops:               {} (no route {}, search timeout {}, overflow {}, expired {}, ttl {}, malformed {})",
            self.drops.total(),
            self.drops.no_route,
            self.drops.search_timeout,
            self.drops.queue_overflow,
            self.drops.queue_expired,
            self.drops.ttl_expired,
            self.drops.malformed
        )?;
        writeln!(f, "  Queries issued:      {}", self.queries_issued)?;
        writeln!(f, "  Searches timed out:  {}", self.searches_timed_out)?;
        writeln!(f, "  Locations resolved:  {}", self.locations_resolved)?;
        if let Some(error) = self.mean_location_error() {
            writeln!(f, "  Mean location error: {:.2} m", error)?;
        }
        write!(f, "  Neighbors lost:      {}", self.neighbors_lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::NodeId;
    use std::time::Duration;

    #[test]
    fn test_record_events() {
        let at = Duration::ZERO;
        let mut stats = SimStats::default();
        for event in [
            RoutingEvent::Originated {
                packet_id: 1,
                destination: NodeId::host(2),
                at,
            },
            RoutingEvent::Originated {
                packet_id: 2,
                destination: NodeId::host(2),
                at,
            },
            RoutingEvent::forwarded(1, NodeId::host(3), ForwardMode::Recovery, at),
            RoutingEvent::Delivered {
                packet_id: 1,
                source: NodeId::host(1),
                hops: 3,
                at,
            },
            RoutingEvent::dropped(Some(2), DropReason::SearchTimeout, at),
            RoutingEvent::LocationResolved {
                target: NodeId::host(2),
                error: Some(4.0),
                at,
            },
            RoutingEvent::LocationResolved {
                target: NodeId::host(2),
                error: None,
                at,
            },
        ] {
            stats.record(&event);
        }

        assert_eq!(stats.delivery_ratio(), 0.5);
        assert_eq!(stats.mean_hops(), Some(3.0));
        assert_eq!(stats.recovery_hops, 1);
        assert_eq!(stats.drops.search_timeout, 1);
        assert_eq!(stats.drops.total(), 1);
        assert_eq!(stats.locations_resolved, 2);
        assert_eq!(stats.mean_location_error(), Some(4.0));
    }

    #[test]
    fn test_empty_stats() {
        let stats = SimStats::default();
        assert_eq!(stats.delivery_ratio(), 0.0);
        assert!(stats.mean_hops().is_none());
        assert!(stats.to_string().contains("Packets sent:        0"));
    }
}
