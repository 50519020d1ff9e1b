//! Tile URL scheme abstraction.
//!
//! A [`UrlScheme`] turns a tile coordinate into the URL it should be fetched
//! from. Each tile server provider supplies its own scheme; the mapping must
//! be deterministic and side-effect free so that the same tile always
//! resolves to the same cache key.
//!
//! # Available Schemes
//!
//! - [`OsmScheme`]: OpenStreetMap-style `{base}/{z}/{x}/{y}.png`
//! - [`XyzScheme`]: template-based scheme with `{x}`, `{y}`, `{z}`
//!   placeholders for custom tile servers

mod osm;
mod xyz;

pub use osm::OsmScheme;
pub use xyz::XyzScheme;

/// Strategy for mapping a tile coordinate to its URL.
///
/// Implementations must be pure: for a given `(x, y, zoom)` the returned URL
/// is always the same, and no state is mutated. Two different coordinates
/// may in theory map to the same URL; the disk cache follows URL identity
/// while in-flight deduplication follows coordinate identity.
pub trait UrlScheme: Send + Sync {
    /// Build the URL for the given tile coordinate.
    ///
    /// # Arguments
    ///
    /// * `x` - Tile column
    /// * `y` - Tile row
    /// * `zoom` - Zoom level
    fn url(&self, x: u32, y: u32, zoom: u8) -> String;
}
