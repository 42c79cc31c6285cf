//! Category to renderer registry

use crate::renderer::{PlainTextRenderer, Renderer};
use parking_lot::RwLock;
use rendermux_core::Category;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared handle to a registered renderer
pub type SharedRenderer<O> = Arc<dyn Renderer<O>>;

/// Maps categories to renderers, with a fallback for everything else
///
/// Registration is meant to happen during setup. Lookups take a read lock
/// and clone an `Arc`, so they are cheap on the render path.
pub struct RendererRegistry<O: 'static> {
    renderers: RwLock<HashMap<Category, SharedRenderer<O>>>,
    fallback: SharedRenderer<O>,
}

impl<O: 'static> RendererRegistry<O> {
    /// Empty registry with an explicit fallback renderer
    pub fn with_fallback(fallback: SharedRenderer<O>) -> Self {
        Self {
            renderers: RwLock::new(HashMap::new()),
            fallback,
        }
    }

    /// Register a renderer under its own category
    ///
    /// Returns the renderer it replaced, if any.
    pub fn register(&self, renderer: SharedRenderer<O>) -> Option<SharedRenderer<O>> {
        let category = renderer.category();
        let name = renderer.name().to_string();
        let previous = self.renderers.write().insert(category, renderer);

        match &previous {
            Some(old) => warn!(
                category = %category,
                previous = old.name(),
                renderer = %name,
                "Overriding registered renderer"
            ),
            None => info!(category = %category, renderer = %name, "Registered renderer"),
        }

        previous
    }

    /// Remove the renderer for a category
    pub fn unregister(&self, category: Category) -> Option<SharedRenderer<O>> {
        let removed = self.renderers.write().remove(&category);
        if removed.is_some() {
            info!(category = %category, "Unregistered renderer");
        }
        removed
    }

    /// Registered renderer for a category, without falling back
    pub fn get(&self, category: Category) -> Option<SharedRenderer<O>> {
        self.renderers.read().get(&category).cloned()
    }

    /// Registered renderer for a category, or the fallback
    pub fn lookup(&self, category: Category) -> SharedRenderer<O> {
        self.get(category).unwrap_or_else(|| {
            debug!(category = %category, "No renderer registered, using fallback");
            self.fallback.clone()
        })
    }

    /// Like [`lookup`](Self::lookup), but also honours `can_handle`
    pub fn resolve(&self, category: Category, text: &str) -> SharedRenderer<O> {
        match self.get(category) {
            Some(renderer) if renderer.can_handle(text) => renderer,
            Some(renderer) => {
                debug!(
                    category = %category,
                    renderer = renderer.name(),
                    "Renderer declined content, using fallback"
                );
                self.fallback.clone()
            }
            None => self.fallback.clone(),
        }
    }

    pub fn fallback(&self) -> SharedRenderer<O> {
        self.fallback.clone()
    }

    /// Registered categories, in declaration order
    pub fn categories(&self) -> Vec<Category> {
        let renderers = self.renderers.read();
        Category::ALL
            .iter()
            .copied()
            .filter(|c| renderers.contains_key(c))
            .collect()
    }

    /// Number of registered renderers (the fallback is not counted)
    pub fn len(&self) -> usize {
        self.renderers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.read().is_empty()
    }
}

impl<O> RendererRegistry<O>
where
    O: From<String> + Send + 'static,
{
    /// Empty registry falling back to [`PlainTextRenderer`]
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(PlainTextRenderer))
    }
}

impl<O> Default for RendererRegistry<O>
where
    O: From<String> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O: 'static> std::fmt::Debug for RendererRegistry<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("categories", &self.categories())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rendermux_core::{Metadata, Result};

    struct Named {
        name: &'static str,
        category: Category,
        accepts: bool,
    }

    #[async_trait]
    impl Renderer<String> for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn category(&self) -> Category {
            self.category
        }

        fn can_handle(&self, _text: &str) -> bool {
            self.accepts
        }

        async fn render(&self, text: &str, _metadata: &Metadata) -> Result<String> {
            Ok(format!("{}:{}", self.name, text))
        }
    }

    fn named(name: &'static str, category: Category) -> SharedRenderer<String> {
        Arc::new(Named {
            name,
            category,
            accepts: true,
        })
    }

    #[test]
    fn test_lookup_falls_back() {
        let registry = RendererRegistry::<String>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup(Category::Json).name(), "plain_text");
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = RendererRegistry::<String>::new();
        assert!(registry.register(named("json", Category::Json)).is_none());

        assert_eq!(registry.lookup(Category::Json).name(), "json");
        assert_eq!(registry.lookup(Category::Math).name(), "plain_text");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_override_returns_previous() {
        let registry = RendererRegistry::<String>::new();
        registry.register(named("first", Category::Code));
        let previous = registry.register(named("second", Category::Code));

        assert_eq!(previous.map(|r| r.name().to_string()).as_deref(), Some("first"));
        assert_eq!(registry.lookup(Category::Code).name(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = RendererRegistry::<String>::new();
        registry.register(named("json", Category::Json));

        assert!(registry.unregister(Category::Json).is_some());
        assert!(registry.unregister(Category::Json).is_none());
        assert_eq!(registry.lookup(Category::Json).name(), "plain_text");
    }

    #[test]
    fn test_resolve_honours_can_handle() {
        let registry = RendererRegistry::<String>::new();
        registry.register(Arc::new(Named {
            name: "picky",
            category: Category::Math,
            accepts: false,
        }));

        assert_eq!(registry.lookup(Category::Math).name(), "picky");
        assert_eq!(registry.resolve(Category::Math, "x^2").name(), "plain_text");
    }

    #[test]
    fn test_categories_in_declaration_order() {
        let registry = RendererRegistry::<String>::new();
        registry.register(named("link", Category::Link));
        registry.register(named("code", Category::Code));
        registry.register(named("json", Category::Json));

        assert_eq!(
            registry.categories(),
            vec![Category::Code, Category::Json, Category::Link]
        );
    }
}
