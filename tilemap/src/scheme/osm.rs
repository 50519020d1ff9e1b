//! OpenStreetMap tile URL scheme.
//!
//! # URL Pattern
//!
//! `https://tile.openstreetmap.org/{z}/{x}/{y}.png`
//!
//! - Standard XYZ tile coordinates (x=column, y=row)
//! - No authentication required
//! - Tiles are 256x256 PNG images
//!
//! # Terms of Use
//!
//! The public OSM tile servers are run on donated resources and require a
//! meaningful `User-Agent`. See: <https://operations.osmfoundation.org/policies/tiles/>

use crate::scheme::UrlScheme;

/// Base URL for the public OpenStreetMap tile server.
const OSM_BASE_URL: &str = "https://tile.openstreetmap.org";

/// OpenStreetMap XYZ tile URL scheme.
///
/// Points at the public OSM tile server by default; use
/// [`OsmScheme::with_base_url`] for self-hosted or mirror servers that use
/// the same path layout.
///
/// # Example
///
/// ```
/// use tilemap::scheme::{OsmScheme, UrlScheme};
///
/// let scheme = OsmScheme::new();
/// assert_eq!(
///     scheme.url(4376, 2932, 13),
///     "https://tile.openstreetmap.org/13/4376/2932.png"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct OsmScheme {
    base_url: String,
}

impl OsmScheme {
    /// Creates a scheme for the public OpenStreetMap tile server.
    pub fn new() -> Self {
        Self {
            base_url: OSM_BASE_URL.to_string(),
        }
    }

    /// Creates a scheme for a server with the OSM path layout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server base URL without a trailing slash
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for OsmScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlScheme for OsmScheme {
    fn url(&self, x: u32, y: u32, zoom: u8) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, zoom, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let scheme = OsmScheme::new();
        assert_eq!(
            scheme.url(4376, 2932, 13),
            "https://tile.openstreetmap.org/13/4376/2932.png"
        );
    }

    #[test]
    fn test_url_construction_zoom_0() {
        let scheme = OsmScheme::new();
        assert_eq!(scheme.url(0, 0, 0), "https://tile.openstreetmap.org/0/0/0.png");
    }

    #[test]
    fn test_url_is_deterministic() {
        let scheme = OsmScheme::new();
        assert_eq!(scheme.url(1, 2, 3), scheme.url(1, 2, 3));
    }

    #[test]
    fn test_custom_base_url() {
        let scheme = OsmScheme::with_base_url("https://tiles.example.com/osm");
        assert_eq!(scheme.url(1, 2, 3), "https://tiles.example.com/osm/3/1/2.png");
    }
}
