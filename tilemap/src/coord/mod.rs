//! Tile coordinate types.
//!
//! Provides the `TileKey` type that identifies a single tile in the
//! slippy-map grid by its column, row, and zoom level.

use std::fmt;

/// Identity of a single map tile.
///
/// Tiles are addressed by `(x, y, zoom)` in the standard XYZ scheme:
/// - X: column (0 to 2^zoom - 1, west to east)
/// - Y: row (0 to 2^zoom - 1, north to south)
/// - Zoom: zoom level
///
/// Equality and hashing use exact-value equality on all three fields, so a
/// `TileKey` can be used directly as the key of an in-flight request table.
///
/// # Example
///
/// ```
/// use tilemap::TileKey;
///
/// let key = TileKey::new(4376, 2932, 13);
/// assert_eq!(key.x(), 4376);
/// assert_eq!(key.y(), 2932);
/// assert_eq!(key.zoom(), 13);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Tile column (X coordinate in the XYZ grid)
    x: u32,
    /// Tile row (Y coordinate in the XYZ grid)
    y: u32,
    /// Zoom level
    zoom: u8,
}

impl TileKey {
    /// Create a new tile key.
    ///
    /// # Arguments
    ///
    /// * `x` - Tile column
    /// * `y` - Tile row
    /// * `zoom` - Zoom level (typically 0-19)
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Get the tile column.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Get the tile row.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Get the zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let key = TileKey::new(4376, 2932, 13);
        assert_eq!(key.x(), 4376);
        assert_eq!(key.y(), 2932);
        assert_eq!(key.zoom(), 13);
    }

    #[test]
    fn test_new_zero_coords() {
        let key = TileKey::new(0, 0, 0);
        assert_eq!(key.x(), 0);
        assert_eq!(key.y(), 0);
        assert_eq!(key.zoom(), 0);
    }

    #[test]
    fn test_equality() {
        let key1 = TileKey::new(1, 2, 3);
        let key2 = TileKey::new(1, 2, 3);
        let key3 = TileKey::new(1, 2, 4);

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TileKey::new(1, 2, 3));
        set.insert(TileKey::new(1, 2, 3));
        set.insert(TileKey::new(3, 2, 1));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        let key = TileKey::new(4376, 2932, 13);
        assert_eq!(format!("{}", key), "13/4376/2932");
    }
}
