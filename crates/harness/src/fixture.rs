// Test documents on local disk and the `file://` URLs the server loads them by.

use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("test document `{}` not found", path.display())]
    Missing { path: PathBuf },

    #[error("failed to resolve `{}`", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{}` cannot be expressed as a file url", path.display())]
    NotUrl { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDocument {
    pub path: PathBuf,
    /// `file://` URL used in `load url=...` and the document channel path.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct DocumentFixture {
    data_dir: PathBuf,
}

impl DocumentFixture {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Locate `file_name` under the data directory.
    pub fn document(&self, file_name: &str) -> Result<TestDocument, FixtureError> {
        let path = self.data_dir.join(file_name);
        let path = std::path::absolute(&path)
            .map_err(|source| FixtureError::Resolve { path: path.clone(), source })?;
        if !path.is_file() {
            return Err(FixtureError::Missing { path });
        }
        let url = Url::from_file_path(&path)
            .map_err(|()| FixtureError::NotUrl { path: path.clone() })?
            .to_string();
        Ok(TestDocument { path, url })
    }
}
