//! Resource limits for document and schema processing
//!
//! Bounds the size and depth of parsed XML and the number of schemas a
//! single acquisition closure may fetch, protecting against oversized
//! inputs and unbounded import chains.

use crate::error::{Error, Result};

/// Limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum XML input size in bytes
    pub max_xml_size: usize,

    /// Maximum element nesting depth
    pub max_xml_depth: usize,

    /// Maximum number of schemas fetched in one acquisition closure
    pub max_schema_downloads: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_xml_depth: 1000,
            max_schema_downloads: 100,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_xml_depth: 100,
            max_schema_downloads: 20,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_xml_depth: 10000,
            max_schema_downloads: 1000,
        }
    }

    /// Check if XML input size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if element nesting depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of fetched schemas is within limits
    pub fn check_schema_downloads(&self, count: usize) -> Result<()> {
        if count > self.max_schema_downloads {
            Err(Error::LimitExceeded(format!(
                "schema closure fetched {} schemas, maximum is {}",
                count, self.max_schema_downloads
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert!(limits.check_xml_depth(500).is_ok());
        assert!(limits.check_xml_depth(1500).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_xml_size < Limits::default().max_xml_size);
        assert!(limits.check_xml_size(11 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_schema_download_limit() {
        let limits = Limits::strict();
        assert!(limits.check_schema_downloads(20).is_ok());
        assert!(limits.check_schema_downloads(21).is_err());
    }
}
