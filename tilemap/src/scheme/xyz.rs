//! Template-based tile URL scheme for custom servers.

use crate::scheme::UrlScheme;

/// URL scheme built from a template with `{x}`, `{y}`, and `{z}` placeholders.
///
/// Covers any tile server that addresses tiles by coordinate in the URL path
/// or query string, without requiring a dedicated scheme type per provider.
///
/// # Example
///
/// ```
/// use tilemap::scheme::{UrlScheme, XyzScheme};
///
/// let scheme = XyzScheme::new("https://tiles.example.com/{z}/{x}/{y}.png");
/// assert_eq!(scheme.url(10, 20, 5), "https://tiles.example.com/5/10/20.png");
/// ```
#[derive(Debug, Clone)]
pub struct XyzScheme {
    template: String,
}

impl XyzScheme {
    /// Creates a scheme from a URL template.
    ///
    /// # Arguments
    ///
    /// * `template` - URL containing `{x}`, `{y}`, and `{z}` placeholders
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl UrlScheme for XyzScheme {
    fn url(&self, x: u32, y: u32, zoom: u8) -> String {
        self.template
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{z}", &zoom.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_template() {
        let scheme = XyzScheme::new("https://tiles.example.com/{z}/{x}/{y}.png");
        assert_eq!(scheme.url(10, 20, 5), "https://tiles.example.com/5/10/20.png");
    }

    #[test]
    fn test_query_template() {
        let scheme = XyzScheme::new("https://example.com/tile?col={x}&row={y}&level={z}");
        assert_eq!(
            scheme.url(1, 2, 3),
            "https://example.com/tile?col=1&row=2&level=3"
        );
    }

    #[test]
    fn test_repeated_placeholder() {
        let scheme = XyzScheme::new("https://example.com/{z}/{z}_{x}_{y}");
        assert_eq!(scheme.url(7, 8, 9), "https://example.com/9/9_7_8");
    }
}
