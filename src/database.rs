//! The salsa database and the inputs it tracks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use braid_ast::Ast;
use braid_core::CompileError;
use braid_types::Mode;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use derive_more::{Display, Error, From};
use tracing::debug;

/// One compilation unit: a syntax tree and the builtin tables it is
/// checked against.
#[salsa::input(debug)]
pub struct SourceProgram {
    #[returns(ref)]
    pub path: PathBuf,
    #[returns(ref)]
    pub ast: Ast,
    pub mode: Mode,
}

#[derive(Debug, Display, Error, From)]
pub enum LoadError {
    #[display("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("{_0}")]
    #[from]
    Parse(CompileError),
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct BraidDatabaseImpl {
    storage: salsa::Storage<Self>,
    sources: Arc<DashMap<(PathBuf, Mode), SourceProgram>>,
}

#[salsa::db]
impl salsa::Database for BraidDatabaseImpl {}

impl BraidDatabaseImpl {
    /// Load the JSON syntax tree at `path`, reusing the input if the file
    /// was already loaded in this mode.
    pub fn load(&self, path: &Path, mode: Mode) -> Result<SourceProgram, LoadError> {
        let path = path.canonicalize().map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match self.sources.entry((path.clone(), mode)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                debug!("loading {}", path.display());
                let text = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                let ast = Ast::from_json(&text).map_err(|err| match err {
                    CompileError::Parse { location, message } => CompileError::Parse {
                        location: format!("{}:{location}", path.display()),
                        message,
                    },
                    other => other,
                })?;
                let source = SourceProgram::new(self, path, ast, mode);
                entry.insert(source);
                Ok(source)
            }
        }
    }
}
