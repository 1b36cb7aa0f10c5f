// Audiobook Master - Audible/ACX submission preparation
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use crate::audio::probe::AudioFormat;
use crate::audio::visualize::VISUALIZATION_DIR;
use std::path::{Path, PathBuf};

/// Suffix of the default output directory name
pub const OUTPUT_DIR_SUFFIX: &str = "_master";

/// Sibling directory `<dirname>_master` next to the input directory
///
/// `/books/long_road` -> `/books/long_road_master`. A path without a
/// usable name (`/`, `.`) gets a `master` subdirectory instead.
pub fn default_output_dir(input: &Path) -> PathBuf {
    match (input.parent(), input.file_name()) {
        (Some(parent), Some(name)) => {
            let mut dirname = name.to_os_string();
            dirname.push(OUTPUT_DIR_SUFFIX);
            parent.join(dirname)
        }
        _ => input.join("master"),
    }
}

/// Remediated output for `source`: `<destination>/<stem>.mp3`
pub fn output_path_for(source: &Path, destination: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "audio".into());
    let mut file_name = stem;
    file_name.push(".");
    file_name.push(AudioFormat::Mp3.to_extension());
    destination.join(file_name)
}

pub fn visualization_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(VISUALIZATION_DIR)
}

/// Whether `a` and `b` name the same file or directory
///
/// Paths that do not exist yet only match when they are equal as written.
pub async fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
