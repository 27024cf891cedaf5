/// Retention and idempotence settings applied by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompliancePolicy {
    /// Retention period assigned to newly created inventory entries.
    pub default_retention_days: u32,
    /// Default threshold for the expiring-soon report class.
    pub retention_warning_days: u32,
    /// Lifetime of processed-event markers.
    pub dedup_ttl_seconds: u64,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            default_retention_days: 365,
            retention_warning_days: 30,
            dedup_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Cache lifetimes per report class, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlPolicy {
    /// Inventory listings.
    pub inventory_seconds: u64,
    /// Retention reports.
    pub retention_seconds: u64,
    /// Per-subject summaries.
    pub subject_seconds: u64,
    /// Access-control listings.
    pub access_controls_seconds: u64,
    /// Category listing.
    pub categories_seconds: u64,
    /// Daily operational counters.
    pub counter_seconds: u64,
}

impl Default for CacheTtlPolicy {
    fn default() -> Self {
        Self {
            inventory_seconds: 300,
            retention_seconds: 300,
            subject_seconds: 300,
            access_controls_seconds: 600,
            categories_seconds: 3600,
            counter_seconds: 7 * 24 * 60 * 60,
        }
    }
}
