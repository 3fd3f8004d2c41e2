//! Page requests for list endpoints.

use serde::Deserialize;

/// A zero-based page of a list, as `?page=&size=` query parameters.
///
/// `size` is clamped to `1..=MAX_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    #[must_use]
    pub const fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Rows per page after clamping.
    #[must_use]
    pub fn limit(self) -> u32 {
        self.size.clamp(1, Self::MAX_SIZE)
    }

    /// Rows to skip before this page.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page) * u64::from(self.limit())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_follows_page_and_size() {
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 30);
    }

    #[test]
    fn test_size_is_clamped() {
        assert_eq!(PageRequest::new(0, 0).limit(), 1);
        assert_eq!(PageRequest::new(2, 500).limit(), PageRequest::MAX_SIZE);
        assert_eq!(PageRequest::new(2, 500).offset(), 200);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let page: PageRequest = serde_json::from_str(r#"{"page": 2}"#).unwrap();
        assert_eq!(page, PageRequest::new(2, PageRequest::DEFAULT_SIZE));
        let page: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(page, PageRequest::default());
    }
}
