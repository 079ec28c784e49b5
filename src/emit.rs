//! Module Emission - One File per Split Entry
//!
//! Writes go through a staging sibling and are renamed into place only
//! once every module has been staged.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SplitConfig;
use crate::entries::Entry;
use crate::naming::{export_name, file_name_stem};
use crate::pipeline::SplitError;

const STAGED_SUFFIX: &str = ".staged";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleFile {
    pub key: String,
    pub export_name: String,
    pub subdirectory: String,
    pub file_name: String,
    pub value_text: String,
    pub path: PathBuf,
}

impl ModuleFile {
    pub fn new(entry: &Entry, config: &SplitConfig, output_dir: &Path, extension: &str) -> Self {
        let subdirectory = config.subdirectory(&entry.key).to_string();
        let file_name = format!("{}.{}", file_name_stem(&entry.key), extension);
        let path = output_dir.join(&subdirectory).join(&file_name);
        Self {
            key: entry.key.clone(),
            export_name: export_name(&entry.key),
            subdirectory,
            file_name,
            value_text: entry.value_text.clone(),
            path,
        }
    }

    /// Marker line plus one export; the value is written untouched.
    pub fn render(&self, origin: &str) -> String {
        format!(
            "/** Auto-split from {origin} */\nexport const {} = {};\n",
            self.export_name, self.value_text
        )
    }
}

pub(crate) fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> SplitError + '_ {
    move |source| SplitError::Filesystem { path: path.to_path_buf(), source }
}

/// A file written next to its destination, not yet visible under the real name.
#[derive(Debug)]
pub struct StagedWrite {
    dest: PathBuf,
    staged: PathBuf,
}

impl StagedWrite {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn commit(self) -> Result<(), SplitError> {
        fs::rename(&self.staged, &self.dest).map_err(fs_error(&self.dest))
    }

    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.staged) {
            tracing::warn!("could not remove staged file {}: {}", self.staged.display(), e);
        }
    }
}

/// Write `content` to a staging sibling of `dest`, creating directories as needed.
pub fn stage(dest: &Path, content: &str) -> Result<StagedWrite, SplitError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(fs_error(parent))?;
    }
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(STAGED_SUFFIX);
    let staged = dest.with_file_name(name);
    fs::write(&staged, content).map_err(fs_error(&staged))?;
    Ok(StagedWrite { dest: dest.to_path_buf(), staged })
}

/// Stage every file, then commit them all. Nothing is renamed into place
/// unless every staging write succeeded.
pub fn write_all<'a, I>(files: I) -> Result<(), SplitError>
where
    I: IntoIterator<Item = (&'a Path, &'a str)>,
{
    let mut staged = Vec::new();
    for (dest, content) in files {
        match stage(dest, content) {
            Ok(write) => staged.push(write),
            Err(e) => {
                staged.into_iter().for_each(StagedWrite::discard);
                return Err(e);
            }
        }
    }
    tracing::debug!("staged {} module files", staged.len());
    for write in staged {
        tracing::debug!("committing {}", write.dest().display());
        write.commit()?;
    }
    Ok(())
}
