//! System-wide constants for the PeerMatch engine.

/// Maximum decimal precision for prices (8 decimal places).
pub const PRICE_PRECISION: u32 = 8;

/// Maximum decimal precision for quantities (8 decimal places).
pub const QTY_PRECISION: u32 = 8;

/// Default number of depth levels per side in a market depth snapshot.
pub const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Default price-suggestion spread in basis points (10 bps = 0.1%).
pub const DEFAULT_SUGGEST_SPREAD_BPS: i64 = 10;

/// Resting opposing orders needed for a HIGH confidence price suggestion.
pub const DEFAULT_HIGH_CONFIDENCE_ORDERS: usize = 10;

/// Resting opposing orders needed for a MEDIUM confidence price suggestion.
pub const DEFAULT_MEDIUM_CONFIDENCE_ORDERS: usize = 3;

/// Default interval between expiry sweeps (milliseconds).
pub const DEFAULT_EXPIRY_SCAN_INTERVAL_MS: u64 = 1000;

/// Default command queue depth per pair lane.
pub const DEFAULT_LANE_QUEUE_DEPTH: usize = 1024;

/// Settlement idempotency cache size (number of trade IDs to remember).
pub const SETTLED_TRADE_CACHE_SIZE: usize = 500_000;

/// Capacity of the outbound event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "PeerMatch";
