use crate::algorithms::coordinates::LocalFrame;
use crate::algorithms::multilateration::SolverConfig;
use crate::core::constants::SINGULARITY_TOLERANCE;
use crate::core::types::{Anchor, AnchorSet, Point2};
use crate::routing::graph::CrossingLayout;
use crate::routing::obstacles::{Obstacle, ObstacleField};
use crate::validation::data::ValidationConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Surveyed anchor position in the local frame (metres)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Identifier as reported by the ranging module (16 hex digits for
    /// serial input)
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Fixed routing crossing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingConfig {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

/// Quadrilateral obstacle, vertices in boundary order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub vertices: [[f64; 2]; 4],
}

/// Precision reporting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdopConfig {
    /// Range standard deviation used to turn GDOP into metres
    pub range_sigma_m: f64,
    pub singularity_tolerance: f64,
}

impl Default for GdopConfig {
    fn default() -> Self {
        Self {
            range_sigma_m: 0.1,
            singularity_tolerance: SINGULARITY_TOLERANCE,
        }
    }
}

fn default_columns() -> usize {
    4
}

/// Complete deployment description loaded from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavConfig {
    pub anchors: Vec<AnchorConfig>,
    #[serde(default)]
    pub crossings: Vec<CrossingConfig>,
    /// Number of crossings per row of the routing grid
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub gdop: GdopConfig,
    /// Mapping from the local frame to map coordinates
    #[serde(default)]
    pub frame: Option<LocalFrame>,
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {parameter}: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("configuration I/O error: {message}")]
    IoError { message: String },

    #[error("configuration serialization error: {message}")]
    SerializationError { message: String },
}

impl ConfigError {
    fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Owns the validated configuration and builds the immutable runtime
/// objects (anchor set, obstacle field, crossing layout) from it
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: NavConfig,
    config_file_path: Option<String>,
}

impl ConfigurationManager {
    /// Wrap an in-memory configuration after validating it
    pub fn new(config: NavConfig) -> Result<Self, ConfigError> {
        Self::validate(&config)?;
        Ok(Self {
            config,
            config_file_path: None,
        })
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("failed to read config file '{}': {}", path_str, e),
        })?;

        let mut manager = Self::from_json_str(&content)?;
        info!(
            "loaded {} anchors, {} crossings, {} obstacles from {}",
            manager.config.anchors.len(),
            manager.config.crossings.len(),
            manager.config.obstacles.len(),
            path_str
        );
        manager.config_file_path = Some(path_str);
        Ok(manager)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = serde_json::from_str(content).map_err(|e| ConfigError::SerializationError {
            message: format!("failed to parse configuration: {}", e),
        })?;
        Self::new(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = serde_json::to_string_pretty(&self.config).map_err(|e| ConfigError::SerializationError {
            message: format!("failed to serialize configuration: {}", e),
        })?;
        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("failed to write config file '{}': {}", path_str, e),
        })?;
        self.config_file_path = Some(path_str);
        Ok(())
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn config_file_path(&self) -> Option<&str> {
        self.config_file_path.as_deref()
    }

    /// Replace the map frame, e.g. after a scale calibration
    pub fn set_frame(&mut self, frame: LocalFrame) {
        self.config.frame = Some(frame);
    }

    /// Check a configuration without applying it
    pub fn validate(config: &NavConfig) -> Result<(), ConfigError> {
        if config.anchors.is_empty() {
            return Err(ConfigError::invalid("anchors", "at least one anchor is required"));
        }
        build_anchor_set(config)?;
        build_obstacle_field(config)?;
        build_crossing_layout(config)?;

        let solver = &config.solver;
        if solver.max_iterations == 0 {
            return Err(ConfigError::invalid("solver.max_iterations", "must be at least 1"));
        }
        for (name, value) in [
            ("solver.cost_tolerance", solver.cost_tolerance),
            ("solver.gradient_tolerance", solver.gradient_tolerance),
            ("solver.step_tolerance", solver.step_tolerance),
            ("solver.initial_damping", solver.initial_damping),
            ("gdop.range_sigma_m", config.gdop.range_sigma_m),
            ("gdop.singularity_tolerance", config.gdop.singularity_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(name, format!("{} is not a non-negative number", value)));
            }
        }
        if !solver.lower_bound.iter().all(|b| b.is_finite()) {
            return Err(ConfigError::invalid("solver.lower_bound", "must be finite"));
        }

        let validation = &config.validation;
        if !(validation.max_range_m.is_finite() && validation.max_range_m > 0.0) {
            return Err(ConfigError::invalid("validation.max_range_m", "must be positive"));
        }
        if validation.min_ranges_3d < 4 || validation.min_ranges_2d < 3 {
            return Err(ConfigError::invalid(
                "validation.min_ranges",
                "a fix needs at least 4 ranges in 3D and 3 in 2D",
            ));
        }

        if let Some(frame) = &config.frame {
            LocalFrame::new(frame.origin, frame.multipliers)
                .map_err(|e| ConfigError::invalid("frame", e.to_string()))?;
        }
        Ok(())
    }

    /// Anchors as a validated `AnchorSet`
    pub fn anchor_set(&self) -> Result<AnchorSet, ConfigError> {
        build_anchor_set(&self.config)
    }

    /// Obstacles as an `ObstacleField`
    pub fn obstacle_field(&self) -> Result<ObstacleField, ConfigError> {
        build_obstacle_field(&self.config)
    }

    /// Crossings as a `CrossingLayout`
    pub fn crossing_layout(&self) -> Result<CrossingLayout, ConfigError> {
        build_crossing_layout(&self.config)
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.config.solver
    }

    pub fn validation_config(&self) -> &ValidationConfig {
        &self.config.validation
    }

    pub fn gdop_config(&self) -> &GdopConfig {
        &self.config.gdop
    }

    pub fn frame(&self) -> Option<LocalFrame> {
        self.config.frame
    }
}

fn build_anchor_set(config: &NavConfig) -> Result<AnchorSet, ConfigError> {
    let anchors = config
        .anchors
        .iter()
        .map(|a| Anchor::new(a.id.clone(), a.x, a.y, a.z))
        .collect();
    AnchorSet::new(anchors).map_err(|e| ConfigError::invalid("anchors", e.to_string()))
}

fn build_obstacle_field(config: &NavConfig) -> Result<ObstacleField, ConfigError> {
    let obstacles = config
        .obstacles
        .iter()
        .enumerate()
        .map(|(i, o)| {
            Obstacle::new(o.vertices.map(Point2::from))
                .map_err(|e| ConfigError::invalid(format!("obstacles[{}]", i), e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ObstacleField::new(obstacles))
}

fn build_crossing_layout(config: &NavConfig) -> Result<CrossingLayout, ConfigError> {
    let crossings = config
        .crossings
        .iter()
        .map(|c| (c.id, Point2::new(c.x, c.y)))
        .collect();
    CrossingLayout::new(crossings, config.columns).map_err(|e| ConfigError::invalid("crossings", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "anchors": [
            {"id": "0000000000000006", "x": 0.0, "y": 0.0, "z": 2.0},
            {"id": "0000000000000007", "x": 8.0, "y": 0.0, "z": 2.0},
            {"id": "0000000000000009", "x": 0.0, "y": 6.0, "z": 2.5}
        ],
        "crossings": [
            {"id": 1, "x": 1.0, "y": 1.0},
            {"id": 2, "x": 5.0, "y": 1.0}
        ],
        "columns": 2,
        "obstacles": [
            {"vertices": [[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 3.0]]}
        ],
        "solver": {"max_iterations": 50},
        "frame": {"origin": {"x": 121.5, "y": 25.0}, "multipliers": {"x": 100000.0, "y": 110000.0}}
    }"#;

    #[test]
    fn test_load_sample() {
        let manager = ConfigurationManager::from_json_str(SAMPLE).unwrap();

        assert_eq!(manager.anchor_set().unwrap().len(), 3);
        assert_eq!(manager.obstacle_field().unwrap().len(), 1);
        assert_eq!(manager.crossing_layout().unwrap().columns(), 2);
        assert_eq!(manager.solver_config().max_iterations, 50);
        // unspecified solver fields fall back to defaults
        assert_eq!(manager.solver_config().step_tolerance, 1e-12);
        assert_eq!(manager.gdop_config(), &GdopConfig::default());
        assert!(manager.frame().is_some());
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let manager = ConfigurationManager::from_json_str(
            r#"{"anchors": [{"id": "a", "x": 0.0, "y": 0.0, "z": 0.0}]}"#,
        )
        .unwrap();
        assert_eq!(manager.config().columns, 4);
        assert!(manager.obstacle_field().unwrap().is_empty());
        assert!(manager.frame().is_none());
    }

    #[test]
    fn test_rejects_duplicate_anchor_ids() {
        let json = r#"{"anchors": [
            {"id": "a", "x": 0.0, "y": 0.0, "z": 0.0},
            {"id": "a", "x": 1.0, "y": 0.0, "z": 0.0}
        ]}"#;
        assert!(matches!(
            ConfigurationManager::from_json_str(json),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = ConfigurationManager::from_json_str(SAMPLE).unwrap().config().clone();
        config.solver.max_iterations = 0;
        assert!(ConfigurationManager::new(config.clone()).is_err());

        config.solver.max_iterations = 10;
        config.columns = 0;
        assert!(ConfigurationManager::new(config).is_err());

        assert!(matches!(
            ConfigurationManager::from_json_str("{not json"),
            Err(ConfigError::SerializationError { .. })
        ));
        assert!(matches!(
            ConfigurationManager::from_file("/nonexistent/uwb-nav.json"),
            Err(ConfigError::IoError { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let mut manager = ConfigurationManager::from_json_str(SAMPLE).unwrap();
        let frame = LocalFrame::new(Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)).unwrap();
        manager.set_frame(frame);

        let path = std::env::temp_dir().join(format!("uwb-nav-config-{}.json", std::process::id()));
        manager.save_to_file(&path).unwrap();
        let reloaded = ConfigurationManager::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(reloaded.frame(), Some(frame));
        assert_eq!(reloaded.config().anchors, manager.config().anchors);
        assert_eq!(reloaded.config().obstacles, manager.config().obstacles);
    }
}
