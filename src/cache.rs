use crate::codegen::{CompileOptions, CompileResult};
use crate::validate::CompilerError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: CompileResult,
}

/// On-disk compile results keyed by file identity, reused only while the
/// source and the options that shape the output are unchanged.
#[derive(Debug, Clone)]
pub struct CompileCache {
    cache_dir: PathBuf,
}

impl CompileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn compute_hash(source: &str, runtime_module: &str, component_name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(runtime_module.as_bytes());
        hasher.update([0u8]);
        hasher.update(component_name.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, file_path: &str, source: &str, options: &CompileOptions) -> Option<CompileResult> {
        let entry_path = self.entry_path(file_path);
        let data = fs::read_to_string(&entry_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(file = file_path, error = %e, "discarding corrupt cache entry");
                fs::remove_file(entry_path).ok();
                return None;
            }
        };

        let current = Self::compute_hash(source, &options.runtime_module, &options.component_name);
        (entry.hash == current).then_some(entry.result)
    }

    pub fn set(&self, file_path: &str, source: &str, options: &CompileOptions, result: &CompileResult) {
        let entry = CacheEntry {
            hash: Self::compute_hash(source, &options.runtime_module, &options.component_name),
            result: result.clone(),
        };
        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(self.entry_path(file_path), data) {
                warn!(file = file_path, error = %e, "failed to write cache entry");
            }
        }
    }

    /// Cached result if fresh, otherwise compile and store.
    pub fn compile(&self, file_path: &str, source: &str, options: &CompileOptions) -> Result<CompileResult, CompilerError> {
        if let Some(hit) = self.get(file_path, source, options) {
            return Ok(hit);
        }
        let result = crate::compile(source, options)?;
        self.set(file_path, source, options, &result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tanni-cache-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    const SOURCE: &str = "<template><p>hi</p></template>";

    #[test]
    fn test_hash_covers_options() {
        let a = CompileCache::compute_hash(SOURCE, "tanni/runtime", "A");
        let b = CompileCache::compute_hash(SOURCE, "tanni/runtime", "B");
        assert_ne!(a, b);
        assert_eq!(a, CompileCache::compute_hash(SOURCE, "tanni/runtime", "A"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = CompileCache::new(scratch_dir("hit"));
        let options = CompileOptions::default();
        let result = cache.compile("src/Hello.tanni", SOURCE, &options).expect("compiles");

        assert_eq!(cache.get("src/Hello.tanni", SOURCE, &options), Some(result));
        assert_eq!(cache.get("src/Hello.tanni", "<template>x</template>", &options), None);

        let renamed = CompileOptions {
            component_name: "Other".to_string(),
            ..CompileOptions::default()
        };
        assert_eq!(cache.get("src/Hello.tanni", SOURCE, &renamed), None);
        fs::remove_dir_all(cache.dir()).ok();
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let cache = CompileCache::new(scratch_dir("corrupt"));
        let path = cache.entry_path("Broken.tanni");
        fs::write(&path, "{ not json").expect("write scratch file");

        assert_eq!(cache.get("Broken.tanni", SOURCE, &CompileOptions::default()), None);
        assert!(!path.exists());
        fs::remove_dir_all(cache.dir()).ok();
    }
}
