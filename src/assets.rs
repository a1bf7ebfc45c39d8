//! Path-keyed, extension-dispatched asset cache.
//!
//! Loaders are registered per file extension and return type-erased shared
//! handles; retrieval is typed and a failed downcast is an explicit
//! [`SceneError::TypeMismatch`], keeping the steady-state path panic-free.
//! The cache is an owned value with its own lifecycle, not process-global
//! state.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SceneError, SceneResult};

type ErasedAsset = Arc<dyn Any + Send + Sync>;
type Loader = Box<dyn Fn(&Path) -> SceneResult<ErasedAsset> + Send + Sync>;

#[derive(Default)]
pub struct AssetCache {
    loaders: HashMap<String, Loader>,
    entries: HashMap<PathBuf, ErasedAsset>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loader for a file extension (without the leading dot).
    pub fn add_loader<F, T>(&mut self, extension: &str, loader: F)
    where
        F: Fn(&Path) -> SceneResult<T> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.loaders.insert(
            extension.to_ascii_lowercase(),
            Box::new(move |path| loader(path).map(|v| Arc::new(v) as ErasedAsset)),
        );
    }

    /// Loads (or returns the cached) asset at `path` as a `T`.
    pub fn load<T: Send + Sync + 'static>(&mut self, path: &Path) -> SceneResult<Arc<T>> {
        if !self.entries.contains_key(path) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            let loader = self
                .loaders
                .get(&ext)
                .ok_or_else(|| SceneError::UnknownExtension(ext.clone()))?;
            let asset = loader(path)?;
            self.entries.insert(path.to_path_buf(), asset);
        }

        let erased = self.entries[path].clone();
        erased
            .downcast::<T>()
            .map_err(|_| SceneError::TypeMismatch {
                path: path.to_path_buf(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Drops every cached entry; registered loaders survive.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_by_path_and_checks_type() {
        let mut cache = AssetCache::new();
        let loads = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = loads.clone();
        cache.add_loader("txt", move |path: &Path| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(path.to_string_lossy().into_owned())
        });

        let path = Path::new("notes/readme.txt");
        let a: Arc<String> = cache.load(path).unwrap();
        let b: Arc<String> = cache.load(path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Wrong type is an error, not a panic.
        let err = cache.load::<u32>(path).unwrap_err();
        assert!(matches!(err, SceneError::TypeMismatch { .. }));
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let mut cache = AssetCache::new();
        let err = cache.load::<String>(Path::new("model.gltf")).unwrap_err();
        assert!(matches!(err, SceneError::UnknownExtension(e) if e == "gltf"));
    }
}
