// Action registry - name/alias lookup table, built once and then read-only.
//
// Reload never mutates a live registry: it builds a fresh one from the
// manifest roots and swaps the pointer, so a dispatch that already took a
// snapshot finishes against a consistent table.

use super::action_errors::{LoadWarning, RegistryError};
use super::action_models::{normalize_key, ActionDescriptor};
use super::handler_catalog::HandlerCatalog;
use super::manifest::ActionManifest;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Default)]
pub struct ActionRegistry {
    /// Registration order, used for listing.
    actions: Vec<Arc<ActionDescriptor>>,
    /// Lowercased primary names and aliases.
    index: HashMap<String, Arc<ActionDescriptor>>,
    warnings: Vec<LoadWarning>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Either every key is inserted or none is.
    pub fn register(
        &mut self,
        descriptor: ActionDescriptor,
    ) -> Result<Arc<ActionDescriptor>, RegistryError> {
        let keys = descriptor.keys();

        if let Some((key, existing)) = keys
            .iter()
            .find_map(|key| self.index.get(key).map(|existing| (key, existing)))
        {
            return Err(RegistryError::DuplicateName {
                name: key.clone(),
                existing: existing.primary_name.clone(),
            });
        }

        let descriptor = Arc::new(descriptor);
        for key in keys {
            self.index.insert(key, Arc::clone(&descriptor));
        }
        self.actions.push(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Case-insensitive lookup across primary names and aliases.
    pub fn resolve(&self, name: &str) -> Option<Arc<ActionDescriptor>> {
        self.index.get(&normalize_key(name)).cloned()
    }

    pub fn actions(&self) -> &[Arc<ActionDescriptor>] {
        &self.actions
    }

    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn warn(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        let warning = LoadWarning {
            path: path.into(),
            reason: reason.into(),
        };
        tracing::warn!(path = %warning.path.display(), reason = %warning.reason, "Skipping action manifest");
        self.warnings.push(warning);
    }

    /// Walk every root recursively and register each manifest found.
    ///
    /// Never fails: unreadable, malformed or colliding manifests are recorded
    /// as warnings and the rest keep loading. Files are visited in path order
    /// so collisions resolve the same way on every start.
    pub fn load(roots: &[PathBuf], catalog: &HandlerCatalog) -> Self {
        let mut registry = Self::new();

        for root in roots {
            if !root.exists() {
                registry.warn(root, "action root does not exist");
                continue;
            }

            let mut files = Vec::new();
            for entry in WalkDir::new(root).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                    Ok(_) => {}
                    Err(err) => {
                        let path = err.path().map(PathBuf::from).unwrap_or_else(|| root.clone());
                        registry.warn(path, err.to_string());
                    }
                }
            }
            files.sort();

            for path in files {
                let descriptor = match ActionManifest::read(&path)
                    .and_then(|manifest| manifest.into_descriptor(catalog, &path))
                {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        registry.warn(&path, err.to_string());
                        continue;
                    }
                };

                if let Err(err) = registry.register(descriptor) {
                    registry.warn(&path, err.to_string());
                }
            }
        }

        tracing::info!(
            actions = registry.len(),
            warnings = registry.warnings.len(),
            "Action registry loaded"
        );
        registry
    }
}

/// The live registry plus what is needed to rebuild it.
pub struct RegistryHandle {
    live: ArcSwap<ActionRegistry>,
    roots: Vec<PathBuf>,
    catalog: HandlerCatalog,
}

impl RegistryHandle {
    pub fn load(roots: Vec<PathBuf>, catalog: HandlerCatalog) -> Self {
        let registry = ActionRegistry::load(&roots, &catalog);
        Self {
            live: ArcSwap::from_pointee(registry),
            roots,
            catalog,
        }
    }

    /// Wrap an already-built registry. Reload will use `roots` and `catalog`.
    pub fn from_registry(
        registry: ActionRegistry,
        roots: Vec<PathBuf>,
        catalog: HandlerCatalog,
    ) -> Self {
        Self {
            live: ArcSwap::from_pointee(registry),
            roots,
            catalog,
        }
    }

    /// A consistent view for the duration of one dispatch.
    pub fn snapshot(&self) -> Arc<ActionRegistry> {
        self.live.load_full()
    }

    /// Rebuild from scratch and atomically replace the live registry.
    pub fn reload(&self) -> Arc<ActionRegistry> {
        let fresh = Arc::new(ActionRegistry::load(&self.roots, &self.catalog));
        self.live.store(Arc::clone(&fresh));
        fresh
    }
}
