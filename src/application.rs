//! "Practical application" text shown next to a surface.
//!
//! The text comes from an `ApplicationSource`. The crate ships a local catalog of the preset
//! surfaces; any other source (a generative text service, a database) plugs in through the
//! same trait. Callers always get a string: failures and timeouts fall back to a fixed text.
use crate::outcome::Outcome;
use crate::symbolic::parse_expr::parse_expression;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// reported when the source fails or times out
pub const FALLBACK_TEXT: &str =
    "Esta función tiene aplicaciones en diversos campos de la ciencia e ingeniería.";
/// reported when the source is switched off in the configuration
pub const DISABLED_TEXT: &str =
    "Configure una fuente de aplicaciones prácticas para ver aplicaciones de esta función.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    #[error("no application text for '{0}'")]
    Unknown(String),
    #[error("application text source timed out after {0:?}")]
    Timeout(Duration),
    #[error("application text source failed: {0}")]
    Source(String),
}

pub trait ApplicationSource: Send + Sync {
    /// A short description of a real-world use of f(x, y) = `function`.
    fn describe(&self, function: &str) -> Result<String, ApplicationError>;
    fn name(&self) -> &'static str;
}

/// Texts for the preset surfaces, matched on the normalized expression so that
/// `x**2 + y**2` and `x^2+y^2` hit the same entry.
pub struct PresetCatalog {
    entries: Vec<(String, &'static str)>,
}

const PRESETS: [(&str, &str); 4] = [
    (
        "x**2 + y**2",
        "El paraboloide modela la energía potencial de un oscilador armónico bidimensional y la \
         forma de las antenas parabólicas, que concentran las señales en su foco.",
    ),
    (
        "x**2 - y**2",
        "La silla de montar describe puntos de equilibrio inestable en mecánica y aparece en \
         teoría de juegos como el punto de silla de un juego de suma cero.",
    ),
    (
        "sin(x)*cos(y)",
        "El producto seno-coseno describe modos de vibración de una membrana rectangular y \
         patrones de interferencia de ondas en óptica y acústica.",
    ),
    (
        "exp(-(x**2 + y**2))",
        "La gaussiana bidimensional modela la difusión del calor desde una fuente puntual y el \
         perfil de intensidad de un haz láser.",
    ),
];

impl PresetCatalog {
    pub fn new() -> Self {
        let entries = PRESETS
            .iter()
            .filter_map(|(function, text)| {
                parse_expression(function)
                    .ok()
                    .map(|expr| (expr.to_string(), *text))
            })
            .collect();
        PresetCatalog { entries }
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationSource for PresetCatalog {
    fn describe(&self, function: &str) -> Result<String, ApplicationError> {
        let key = parse_expression(function)
            .map_err(|e| ApplicationError::Source(e.to_string()))?
            .to_string();
        self.entries
            .iter()
            .find(|(preset, _)| *preset == key)
            .map(|(_, text)| text.to_string())
            .ok_or(ApplicationError::Unknown(function.to_string()))
    }
    fn name(&self) -> &'static str {
        "preset catalog"
    }
}

/// Runs `source` on the blocking pool with a deadline. Errors, panics and timeouts become a
/// `Degenerate` outcome carrying `FALLBACK_TEXT`.
pub async fn describe_with_timeout(
    source: Arc<dyn ApplicationSource>,
    function: String,
    timeout: Duration,
) -> Outcome<String> {
    let name = source.name();
    let task = tokio::task::spawn_blocking(move || source.describe(&function));
    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ApplicationError::Source(join_error.to_string())),
        Err(_) => Err(ApplicationError::Timeout(timeout)),
    };
    match result {
        Ok(text) => Outcome::computed(text),
        Err(ApplicationError::Unknown(function)) => {
            debug!("{} has no text for '{}'", name, function);
            Outcome::degenerate(FALLBACK_TEXT.to_string(), format!("no application text for '{}'", function))
        }
        Err(e) => {
            warn!("{}: {}", name, e);
            Outcome::degenerate(FALLBACK_TEXT.to_string(), e.to_string())
        }
    }
}
