/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Byte-source abstraction so the pipeline driver can be exercised against
//! in-memory fixtures without touching disk.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait FileReader {
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>>;
    fn write_text(&self, path: &Path, content: &str) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// Production file reader, backed by the real filesystem.
pub struct DiskFileReader;

impl FileReader for DiskFileReader {
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        Ok(fs::write(path, content)?)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory file reader for tests.
#[derive(Default)]
pub struct MockFileReader {
    files: HashMap<PathBuf, Vec<u8>>,
    written: std::cell::RefCell<HashMap<PathBuf, String>>,
}

impl MockFileReader {
    pub fn add_binary_file(&mut self, path: &str, content: &[u8]) {
        self.files
            .insert(PathBuf::from(path), content.to_vec());
    }

    pub fn written(&self, path: &str) -> Option<String> {
        self.written.borrow().get(&PathBuf::from(path)).cloned()
    }
}

impl FileReader for MockFileReader {
    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock file not found: {}", path.display()))
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        self.written
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn remove_file(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
