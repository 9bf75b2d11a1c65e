use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::binder::bind;
use crate::error::CompileError;
use crate::generator::{generate, GeneratedCode};
use crate::imports::FileImportResolver;
use crate::parser::parse;
use crate::syntax::IdlSpec;

/// Where one IDL file's generated code goes.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub input:           PathBuf,
    /// Declarations file.
    pub header:          PathBuf,
    /// Definitions file. It `include!`s the header.
    pub source:          PathBuf,
    /// Relative `header` and `source` paths are taken from here.
    pub output_base_dir: Option<PathBuf>,
    pub import_dirs:     Vec<PathBuf>,
}

impl CompileOptions {
    pub fn new(input: impl Into<PathBuf>, header: impl Into<PathBuf>, source: impl Into<PathBuf>) -> CompileOptions {
        CompileOptions {
            input: input.into(),
            header: header.into(),
            source: source.into(),
            ..CompileOptions::default()
        }
    }

    fn output_path(&self, path: &Path) -> PathBuf {
        match &self.output_base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn header_path(&self) -> PathBuf {
        self.output_path(&self.header)
    }

    pub fn source_path(&self) -> PathBuf {
        self.output_path(&self.source)
    }

    /// The header as the definitions file's `include!` names it.
    pub fn include_path(&self) -> String {
        let source = self.source_path();
        let from = source.parent().unwrap_or_else(|| Path::new(""));
        relative_path(from, &self.header_path())
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn input_name(&self) -> String {
        self.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.to_string_lossy().into_owned())
    }
}

fn normal_components(path: &Path) -> Vec<Component<'_>> {
    path.components().filter(|c| *c != Component::CurDir).collect()
}

/// `to` relative to the directory `from`. Both paths are taken as given;
/// nothing is canonicalized.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = normal_components(from);
    let to = normal_components(to);
    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Parses `path` and everything it imports.
pub fn parse_file(path: &Path, import_dirs: &[PathBuf]) -> Result<IdlSpec, CompileError> {
    let text = fs::read_to_string(path)?;
    let resolver = FileImportResolver::new(import_dirs.to_vec());
    tracing::info!("parsing {}", path.display());
    parse(&text, &path.to_string_lossy(), &resolver).map_err(CompileError::Schema)
}

/// Binds an already parsed file and generates both texts.
pub fn generate_code(spec: &IdlSpec, options: &CompileOptions) -> Result<GeneratedCode, CompileError> {
    let idl = bind(spec).map_err(CompileError::Schema)?;
    generate(&idl, &options.input_name(), &options.include_path())
}

pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<GeneratedCode, CompileError> {
    let spec = parse_file(path, &options.import_dirs)?;
    generate_code(&spec, options)
}

/// Writes both files. Each text is staged in a temporary file next to its
/// target first, then both are renamed into place; if a rename fails the
/// files already moved are removed again, so a pair is never half written.
pub fn write_generated(code: &GeneratedCode, options: &CompileOptions) -> Result<(), CompileError> {
    let mut staged = Vec::new();
    for (path, text) in [
        (options.header_path(), &code.header),
        (options.source_path(), &code.source),
    ] {
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let mut file = NamedTempFile::new_in(&parent)?;
        file.write_all(text.as_bytes())?;
        staged.push((file, path));
    }

    let mut written: Vec<PathBuf> = Vec::new();
    for (file, path) in staged {
        if let Err(err) = file.persist(&path) {
            for done in &written {
                let _ = fs::remove_file(done);
            }
            return Err(err.error.into());
        }
        tracing::info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_path_is_relative_to_the_definitions_file() {
        let mut options = CompileOptions::new("idl/example.idl", "gen/decl/example.rs", "gen/example.rs");
        assert_eq!(options.include_path(), "decl/example.rs");

        options.header = PathBuf::from("include/example_decl.rs");
        options.source = PathBuf::from("src/example_gen.rs");
        options.output_base_dir = Some(PathBuf::from("out"));
        assert_eq!(options.header_path(), PathBuf::from("out/include/example_decl.rs"));
        assert_eq!(options.include_path(), "../include/example_decl.rs");
    }

    #[test]
    fn same_directory_gives_a_bare_file_name() {
        assert_eq!(
            relative_path(Path::new("./src"), Path::new("src/example_gen_decl.rs")),
            PathBuf::from("example_gen_decl.rs")
        );
    }

    #[test]
    fn failed_parse_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.idl");
        fs::write(&input, "struct point { field x = no_such_type; }").unwrap();
        let options = CompileOptions::new(&input, dir.path().join("h.rs"), dir.path().join("s.rs"));

        let result = compile_file(&input, &options);
        assert!(matches!(result, Err(CompileError::Schema(_))));
        assert!(!dir.path().join("h.rs").exists());
        assert!(!dir.path().join("s.rs").exists());
    }

    #[test]
    fn failed_write_leaves_no_header_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("colors.idl");
        fs::write(&input, "enum color { type = string; value kRed = \"red\"; }").unwrap();
        let options = CompileOptions::new(&input, dir.path().join("h.rs"), dir.path().join("s.rs"));
        let code = compile_file(&input, &options).unwrap();

        // A directory where the definitions file should go makes the rename fail.
        fs::create_dir(dir.path().join("s.rs")).unwrap();
        let result = write_generated(&code, &options);
        assert!(matches!(result, Err(CompileError::Io(_))));
        assert!(!dir.path().join("h.rs").exists());

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["colors.idl", "s.rs"]);
    }

    #[test]
    fn write_replaces_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("colors.idl");
        fs::write(&input, "enum color { type = string; value kRed = \"red\"; }").unwrap();
        let options = CompileOptions::new(&input, dir.path().join("h.rs"), dir.path().join("s.rs"));
        fs::write(dir.path().join("h.rs"), "stale").unwrap();

        let code = compile_file(&input, &options).unwrap();
        write_generated(&code, &options).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("h.rs")).unwrap(), code.header);
        assert_eq!(fs::read_to_string(dir.path().join("s.rs")).unwrap(), code.source);
    }
}
