use std::{fs, path::Path};

use crate::infra::{contracts::FileReader, error::AppError};

#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileReader;

impl FileReader for FsFileReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>, AppError> {
        fs::read(path).map_err(|source| AppError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }
}
