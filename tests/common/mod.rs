#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tempfile::TempDir;

/// Fixture tree:
///
/// ```text
/// dist/a.txt
/// dist/sub/b.txt
/// dist/sub/c.js
/// info.txt
/// ```
pub fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("dist/sub")).unwrap();
    fs::write(root.join("dist/a.txt"), "alpha ".repeat(200)).unwrap();
    fs::write(root.join("dist/sub/b.txt"), "bravo").unwrap();
    fs::write(root.join("dist/sub/c.js"), "console.log('c')").unwrap();
    fs::write(root.join("info.txt"), "info").unwrap();
    dir
}

pub fn posix(path: &Path) -> String {
    zipup::path::path_to_posix(path)
}

pub struct Member {
    pub content: Vec<u8>,
    pub method: zip::CompressionMethod,
}

pub struct Archive {
    /// File members by name.
    pub files: BTreeMap<String, Member>,
    /// Directory members in archive order.
    pub dirs: Vec<String>,
    /// All member names in archive order.
    pub order: Vec<String>,
}

impl Archive {
    pub fn names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn text(&self, name: &str) -> String {
        String::from_utf8(self.files[name].content.clone()).unwrap()
    }
}

pub fn read_archive(path: &Path) -> Archive {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut files = BTreeMap::new();
    let mut dirs = Vec::new();
    let mut order = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        order.push(name.clone());
        if file.is_dir() {
            dirs.push(name);
            continue;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        let method = file.compression();
        files.insert(name, Member { content, method });
    }
    Archive { files, dirs, order }
}
