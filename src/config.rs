//! Process-wide configuration read from a TOML file.
//!
//! Every section and every field is optional; a missing file means all defaults.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [integration]
//! symbolic = false
//! max_depth = 8
//!
//! [optimization]
//! multi_start = true
//! ```
use crate::numerical::constrained::ConstrainedSettings;
use crate::numerical::critical_points::CriticalPointSettings;
use crate::numerical::quadrature::QuadratureSettings;
use crate::numerical::surface::EvaluationDomain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// environment variable holding the configuration path
pub const CONFIG_ENV: &str = "MULTIVAR_CALC_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            log_to_file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub domain: EvaluationDomain,
    pub point_x: f64,
    pub point_y: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        VisualizationConfig {
            domain: EvaluationDomain::visualization_default(),
            point_x: 1.0,
            point_y: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub domain: EvaluationDomain,
    /// try iterated antiderivatives before quadrature
    pub symbolic: bool,
    pub low_degree: usize,
    pub high_degree: usize,
    pub tolerance: f64,
    pub max_depth: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        let quadrature = QuadratureSettings::default();
        IntegrationConfig {
            domain: EvaluationDomain::integration_default(),
            symbolic: true,
            low_degree: quadrature.low_degree,
            high_degree: quadrature.high_degree,
            tolerance: quadrature.tolerance,
            max_depth: quadrature.max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub seeds_per_axis: usize,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub multi_start: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        let settings = CriticalPointSettings::default();
        OptimizationConfig {
            seeds_per_axis: settings.seeds_per_axis,
            tolerance: settings.tolerance,
            max_iterations: settings.max_iterations,
            multi_start: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub enabled: bool,
    pub timeout_secs: f64,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            enabled: true,
            timeout_secs: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// attach the list of degenerate and failed values to every response
    pub diagnostics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub visualization: VisualizationConfig,
    pub integration: IntegrationConfig,
    pub optimization: OptimizationConfig,
    pub application: ApplicationConfig,
    pub output: OutputConfig,
}

fn check_domain(name: &str, domain: &EvaluationDomain) -> Result<(), ConfigError> {
    let ordered = |lo: f64, hi: f64| lo.is_finite() && hi.is_finite() && lo < hi;
    if ordered(domain.x_min, domain.x_max) && ordered(domain.y_min, domain.y_max) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{}.domain needs finite bounds with min < max, got {:?}",
            name, domain
        )))
    }
}

impl CalculatorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CalculatorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults unless `path` is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_domain("visualization", &self.visualization.domain)?;
        check_domain("integration", &self.integration.domain)?;
        if !(self.integration.tolerance > 0.0) || !(self.optimization.tolerance > 0.0) {
            return Err(ConfigError::Invalid("tolerances must be positive".to_string()));
        }
        if self.integration.low_degree >= self.integration.high_degree {
            return Err(ConfigError::Invalid(format!(
                "integration.low_degree ({}) must be below integration.high_degree ({})",
                self.integration.low_degree, self.integration.high_degree
            )));
        }
        if self.optimization.seeds_per_axis == 0 || self.optimization.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "optimization.seeds_per_axis and optimization.max_iterations must be positive"
                    .to_string(),
            ));
        }
        if !(self.application.timeout_secs > 0.0) || !self.application.timeout_secs.is_finite() {
            return Err(ConfigError::Invalid(
                "application.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn critical_point_settings(&self) -> CriticalPointSettings {
        CriticalPointSettings {
            seeds_per_axis: self.optimization.seeds_per_axis,
            tolerance: self.optimization.tolerance,
            max_iterations: self.optimization.max_iterations,
        }
    }

    pub fn constrained_settings(&self) -> ConstrainedSettings {
        ConstrainedSettings {
            tolerance: self.optimization.tolerance,
            max_iterations: self.optimization.max_iterations,
            multi_start: self.optimization.multi_start,
        }
    }

    pub fn quadrature_settings(&self) -> QuadratureSettings {
        QuadratureSettings {
            low_degree: self.integration.low_degree,
            high_degree: self.integration.high_degree,
            tolerance: self.integration.tolerance,
            max_depth: self.integration.max_depth,
        }
    }

    pub fn application_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.application.timeout_secs)
    }
}

/// First command line argument, otherwise the `MULTIVAR_CALC_CONFIG` variable.
pub fn config_path(mut args: impl Iterator<Item = String>, env: Option<String>) -> Option<PathBuf> {
    args.next()
        .or(env)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(
            CalculatorConfig::from_toml_str("").unwrap(),
            CalculatorConfig::default()
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = CalculatorConfig::from_toml_str(
            r#"
            [integration]
            symbolic = false
            max_depth = 8

            [optimization]
            multi_start = true

            [visualization.domain]
            x_min = -2.0
            x_max = 2.0
            y_min = -1.0
            y_max = 1.0
            "#,
        )
        .unwrap();
        assert!(!config.integration.symbolic);
        assert_eq!(config.quadrature_settings().max_depth, 8);
        assert_eq!(config.quadrature_settings().high_degree, 15);
        assert!(config.constrained_settings().multi_start);
        assert_eq!(config.visualization.domain, EvaluationDomain::new(-2.0, 2.0, -1.0, 1.0));
        assert_eq!(config.visualization.point_x, 1.0);
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            CalculatorConfig::from_toml_str("[integration]\nlow_degree = 20"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CalculatorConfig::from_toml_str("[optimization]\nseeds_per_axis = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CalculatorConfig::from_toml_str("[output]\ndiagnostics = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\ndiagnostics = true\n[application]\ntimeout_secs = 2.5").unwrap();
        let config = CalculatorConfig::load(file.path()).unwrap();
        assert!(config.output.diagnostics);
        assert_eq!(config.application_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CalculatorConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert_eq!(
            CalculatorConfig::load_or_default(None).unwrap(),
            CalculatorConfig::default()
        );
    }

    #[test]
    fn test_config_path_precedence() {
        let args = vec!["cli.toml".to_string()].into_iter();
        assert_eq!(
            config_path(args, Some("env.toml".to_string())),
            Some(PathBuf::from("cli.toml"))
        );
        assert_eq!(
            config_path(std::iter::empty(), Some("env.toml".to_string())),
            Some(PathBuf::from("env.toml"))
        );
        assert_eq!(config_path(std::iter::empty(), None), None);
    }
}
