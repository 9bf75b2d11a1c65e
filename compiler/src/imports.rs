use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Finds and reads imported IDL files.
pub trait ImportResolver {
    /// Returns a resolved path for `imported_file` as written in `base_file`.
    fn resolve(&self, base_file: &str, imported_file: &str) -> Option<String>;

    fn open(&self, resolved_file: &str) -> io::Result<String>;
}

/// Looks next to the importing file first, then in each import directory.
#[derive(Debug, Clone, Default)]
pub struct FileImportResolver {
    import_directories: Vec<PathBuf>,
}

impl FileImportResolver {
    pub fn new(import_directories: Vec<PathBuf>) -> FileImportResolver {
        FileImportResolver { import_directories }
    }
}

impl ImportResolver for FileImportResolver {
    fn resolve(&self, base_file: &str, imported_file: &str) -> Option<String> {
        let base_dir = Path::new(base_file).parent().map(Path::to_path_buf);
        base_dir
            .into_iter()
            .chain(self.import_directories.iter().cloned())
            .map(|dir| dir.join(imported_file))
            .find(|candidate| candidate.is_file())
            .map(|found| {
                tracing::debug!("resolved import {} to {}", imported_file, found.display());
                found.to_string_lossy().into_owned()
            })
    }

    fn open(&self, resolved_file: &str) -> io::Result<String> {
        fs::read_to_string(resolved_file)
    }
}

/// Serves imports from memory, keyed by the name used in `imports`.
#[derive(Debug, Clone, Default)]
pub struct MemoryImportResolver {
    files: BTreeMap<String, String>,
}

impl MemoryImportResolver {
    pub fn new() -> MemoryImportResolver {
        MemoryImportResolver::default()
    }

    pub fn add(&mut self, name: &str, text: &str) -> &mut Self {
        self.files.insert(name.to_owned(), text.to_owned());
        self
    }
}

impl ImportResolver for MemoryImportResolver {
    fn resolve(&self, _base_file: &str, imported_file: &str) -> Option<String> {
        self.files
            .contains_key(imported_file)
            .then(|| imported_file.to_owned())
    }

    fn open(&self, resolved_file: &str) -> io::Result<String> {
        self.files.get(resolved_file).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, resolved_file.to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_resolver_prefers_sibling_then_import_dirs() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        let include = root.path().join("include");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&include).unwrap();
        fs::write(src.join("main.idl"), "").unwrap();
        fs::write(src.join("sibling.idl"), "sibling").unwrap();
        fs::write(include.join("shared.idl"), "shared").unwrap();
        fs::write(include.join("sibling.idl"), "shadowed").unwrap();

        let resolver = FileImportResolver::new(vec![include.clone()]);
        let main = src.join("main.idl").to_string_lossy().into_owned();

        let sibling = resolver.resolve(&main, "sibling.idl").unwrap();
        assert_eq!(resolver.open(&sibling).unwrap(), "sibling");

        let shared = resolver.resolve(&main, "shared.idl").unwrap();
        assert_eq!(resolver.open(&shared).unwrap(), "shared");

        assert!(resolver.resolve(&main, "missing.idl").is_none());
    }

    #[test]
    fn memory_resolver() {
        let mut resolver = MemoryImportResolver::new();
        resolver.add("base.idl", "type t {}");
        assert_eq!(resolver.resolve("x.idl", "base.idl").as_deref(), Some("base.idl"));
        assert!(resolver.resolve("x.idl", "other.idl").is_none());
        assert!(resolver.open("other.idl").is_err());
    }
}
