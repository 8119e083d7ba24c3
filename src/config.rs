use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub slug: SlugConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugConfig {
    /// Delay between the last keystroke and the availability lookup
    pub debounce_ms: u64,
    /// Default pattern a slug must match before any lookup is issued
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Discriminator property name for blocks items unless the schema overrides it
    pub discriminator: String,
    /// Maximum schema nesting depth accepted by the composite renderer
    pub max_depth: u32,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::defaults().with_env_overrides()
    }

    fn defaults() -> Self {
        Self {
            slug: SlugConfig {
                debounce_ms: 400,
                pattern: "^[a-z0-9]+(?:-[a-z0-9]+)*$".to_string(),
            },
            render: RenderConfig {
                discriminator: "blockType".to_string(),
                max_depth: 16,
            },
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("FIELDKIT_SLUG_DEBOUNCE_MS") {
            self.slug.debounce_ms = v.parse().unwrap_or(self.slug.debounce_ms);
        }
        if let Ok(v) = env::var("FIELDKIT_SLUG_PATTERN") {
            self.slug.pattern = v;
        }
        if let Ok(v) = env::var("FIELDKIT_DISCRIMINATOR") {
            self.render.discriminator = v;
        }
        if let Ok(v) = env::var("FIELDKIT_MAX_DEPTH") {
            self.render.max_depth = v.parse().unwrap_or(self.render.max_depth);
        }
        self
    }
}

static CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::from_env);

/// Global engine configuration, loaded once from the environment
pub fn config() -> &'static EngineConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::defaults();
        assert_eq!(cfg.slug.debounce_ms, 400);
        assert_eq!(cfg.render.discriminator, "blockType");
        assert!(cfg.render.max_depth >= 8);
    }
}
