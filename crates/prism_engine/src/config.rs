//! Configuration system
//!
//! Serializable settings for the partitioning subsystem, loadable from
//! TOML or RON files.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::spatial::geom_culler::DEFAULT_MAX_DEPTH;
use crate::spatial::{OctreePartitioner, Partitioner, SpatialHashPartitioner};

/// Configuration trait
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Which broad-phase partitioner to use for the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerKind {
    /// Dynamic sparse octree
    #[default]
    Octree,
    /// Hierarchical spatial hash
    SpatialHash,
}

/// Settings for the static geometry culler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeomCullerConfig {
    /// Depth the per-mesh octree is pre-grown to
    pub max_depth: u8,
}

impl Default for GeomCullerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Top-level settings for the partitioning and culling subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CullingConfig {
    /// Which partitioner implementation the scene manager should use
    pub partitioner: PartitionerKind,
    /// Static geometry culler settings
    pub geom_culler: GeomCullerConfig,
}

impl CullingConfig {
    /// Build the configured partitioner implementation
    pub fn create_partitioner(&self) -> Box<dyn Partitioner> {
        match self.partitioner {
            PartitionerKind::Octree => Box::new(OctreePartitioner::new()),
            PartitionerKind::SpatialHash => Box::new(SpatialHashPartitioner::new()),
        }
    }
}

impl Config for CullingConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_round_trip() {
        let config = CullingConfig {
            partitioner: PartitionerKind::SpatialHash,
            geom_culler: GeomCullerConfig { max_depth: 3 },
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: CullingConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = CullingConfig::default();

        let serialized = ron::ser::to_string(&config).unwrap();
        let parsed: CullingConfig = ron::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let parsed: CullingConfig = toml::from_str("partitioner = \"spatial_hash\"\n").unwrap();
        assert_eq!(parsed.partitioner, PartitionerKind::SpatialHash);
        assert_eq!(parsed.geom_culler.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = CullingConfig::default().save_to_file("culling.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
