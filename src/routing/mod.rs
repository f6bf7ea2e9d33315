pub mod dispatch;

use rustc_hash::FxHashMap;

use crate::config::{AppConfig, ModelRouteConfig};

/// The resolved upstream target for a requested model name.
#[derive(Debug, Clone, Copy)]
pub struct RouteTarget<'a> {
    pub route: &'a ModelRouteConfig,
    /// Whether the requested name was unknown and the default route was used.
    pub fallback: bool,
}

/// Maps client-facing model names to upstream models.
///
/// Lookup is exact first, then ASCII case-insensitive. Unknown names use the
/// first configured model.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    routes: Vec<ModelRouteConfig>,
    exact: FxHashMap<String, usize>,
    lowercase: FxHashMap<String, usize>,
}

impl ModelRouter {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self::from_routes(config.models.clone())
    }

    #[must_use]
    pub fn from_routes(routes: Vec<ModelRouteConfig>) -> Self {
        let mut exact = FxHashMap::default();
        let mut lowercase = FxHashMap::default();
        for (idx, route) in routes.iter().enumerate() {
            exact.entry(route.name.clone()).or_insert(idx);
            lowercase
                .entry(route.name.to_ascii_lowercase())
                .or_insert(idx);
        }
        Self {
            routes,
            exact,
            lowercase,
        }
    }

    /// Resolve `model`, or `None` when no models are configured.
    #[must_use]
    pub fn resolve(&self, model: &str) -> Option<RouteTarget<'_>> {
        let model = model.trim();
        let matched = self
            .exact
            .get(model)
            .or_else(|| self.lowercase.get(&model.to_ascii_lowercase()))
            .copied();
        match matched {
            Some(idx) => self.routes.get(idx).map(|route| RouteTarget {
                route,
                fallback: false,
            }),
            None => self.routes.first().map(|route| RouteTarget {
                route,
                fallback: true,
            }),
        }
    }

    #[must_use]
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.name.as_str())
    }

    #[must_use]
    pub fn known_model_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case_insensitive_lookup() {
        let router = ModelRouter::new(&AppConfig::default());
        let target = router.resolve("GLM-4.5-Thinking").unwrap();
        assert!(!target.fallback);
        assert!(target.route.thinking);

        let target = router.resolve("glm-4.6-search").unwrap();
        assert_eq!(target.route.name, "GLM-4.6-Search");
        assert!(target.route.web_search);
    }

    #[test]
    fn test_unknown_model_falls_back_to_first() {
        let router = ModelRouter::new(&AppConfig::default());
        let target = router.resolve("gpt-4o").unwrap();
        assert!(target.fallback);
        assert_eq!(target.route.name, "GLM-4.5");
    }

    #[test]
    fn test_empty_router() {
        let router = ModelRouter::from_routes(Vec::new());
        assert!(router.resolve("GLM-4.5").is_none());
        assert_eq!(router.known_model_count(), 0);
    }
}
