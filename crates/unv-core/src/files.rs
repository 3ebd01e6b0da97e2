use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// List every .unv file under `root` (recursively), sorted by path.
pub fn find_universe_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().flatten() {
        let p = entry.path();
        let is_unv = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| e.eq_ignore_ascii_case("unv"))
            == Some(true);
        if p.is_file() && is_unv {
            out.push(p.to_path_buf());
        }
    }
    out.sort();
    out
}
