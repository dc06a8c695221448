//! Name-based lookup of stage implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::stage::{CsvExtractor, CsvLoader, DropColumns, Extractor, Loader, StageKind, Transformer};

/// One registered stage, as listed by `conveyor stages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    pub name: String,
    pub kind: StageKind,
}

/// Maps a pipeline's `use:` references to stage trait objects.
///
/// Names are scoped per capability, so `csv` can be both an extractor and a
/// loader.
#[derive(Clone, Default)]
pub struct StageRegistry {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
    transformers: BTreeMap<String, Arc<dyn Transformer>>,
    loaders: BTreeMap<String, Arc<dyn Loader>>,
}

impl StageRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the stages shipped in this crate.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_extractor(Arc::new(CsvExtractor));
        registry.register_transformer(Arc::new(DropColumns));
        registry.register_loader(Arc::new(CsvLoader));
        registry
    }

    /// Registers under the stage's own name, replacing any previous entry.
    pub fn register_extractor(&mut self, stage: Arc<dyn Extractor>) {
        self.extractors.insert(stage.name().to_string(), stage);
    }

    pub fn register_transformer(&mut self, stage: Arc<dyn Transformer>) {
        self.transformers.insert(stage.name().to_string(), stage);
    }

    pub fn register_loader(&mut self, stage: Arc<dyn Loader>) {
        self.loaders.insert(stage.name().to_string(), stage);
    }

    #[must_use]
    pub fn extractor(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(name).cloned()
    }

    #[must_use]
    pub fn transformer(&self, name: &str) -> Option<Arc<dyn Transformer>> {
        self.transformers.get(name).cloned()
    }

    #[must_use]
    pub fn loader(&self, name: &str) -> Option<Arc<dyn Loader>> {
        self.loaders.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: StageKind, name: &str) -> bool {
        match kind {
            StageKind::Extract => self.extractors.contains_key(name),
            StageKind::Transform => self.transformers.contains_key(name),
            StageKind::Load => self.loaders.contains_key(name),
        }
    }

    /// Registered names for one capability, sorted.
    #[must_use]
    pub fn names(&self, kind: StageKind) -> Vec<&str> {
        match kind {
            StageKind::Extract => self.extractors.keys().map(String::as_str).collect(),
            StageKind::Transform => self.transformers.keys().map(String::as_str).collect(),
            StageKind::Load => self.loaders.keys().map(String::as_str).collect(),
        }
    }

    /// Every registered stage, extractors first, then transformers, then loaders.
    #[must_use]
    pub fn describe(&self) -> Vec<StageDescriptor> {
        [StageKind::Extract, StageKind::Transform, StageKind::Load]
            .into_iter()
            .flat_map(|kind| {
                self.names(kind).into_iter().map(move |name| StageDescriptor {
                    name: name.to_string(),
                    kind,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("extractors", &self.names(StageKind::Extract))
            .field("transformers", &self.names(StageKind::Transform))
            .field("loaders", &self.names(StageKind::Load))
            .finish()
    }
}
