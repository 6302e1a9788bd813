//! The `_.json` manifest of a segmented directory.
//!
//! An ordered JSON array whose elements are either an integer (a literal
//! segment file of that name) or a 2-tuple `[digest_hex, [offsets]]` (a
//! reference to a stored block at that length-prefix path). Valid
//! manifests alternate segment / reference and begin and end with a
//! segment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::BeeError;

pub const METADATA_FILE_NAME: &str = "_.json";
pub const WITHOUT_BLOCK_POINTERS_FILE_NAME: &str = "wbp.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Segment(u32),
    Reference(String, Vec<u64>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_segment(&mut self, index: u32) {
        self.entries.push(ManifestEntry::Segment(index));
    }

    pub fn push_reference(&mut self, digest_hex: String, path: Vec<u64>) {
        self.entries.push(ManifestEntry::Reference(digest_hex, path));
    }

    /// Load and validate `dir/_.json`.
    ///
    /// # Errors
    /// Returns an I/O or JSON error on read failure and
    /// `MalformedEncoding` if the entry shape is invalid.
    pub fn load(dir: &Path) -> Result<Self, BeeError> {
        let bytes = std::fs::read(dir.join(METADATA_FILE_NAME))?;
        let entries: Vec<ManifestEntry> = serde_json::from_slice(&bytes)?;
        let manifest = Self { entries };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write `dir/_.json`.
    ///
    /// # Errors
    /// Returns an error if validation or the write fails.
    pub fn store(&self, dir: &Path) -> Result<(), BeeError> {
        self.validate()?;
        let bytes = serde_json::to_vec(&self.entries)?;
        std::fs::write(dir.join(METADATA_FILE_NAME), bytes)?;
        Ok(())
    }

    /// Check the segment/reference alternation and segment numbering.
    ///
    /// # Errors
    /// Returns `MalformedEncoding` describing the first violation.
    pub fn validate(&self) -> Result<(), BeeError> {
        let mut expect_segment = true;
        let mut next_index = 1u32;
        for entry in &self.entries {
            match entry {
                ManifestEntry::Segment(index) => {
                    if !expect_segment {
                        return Err(BeeError::MalformedEncoding(
                            "manifest holds two adjacent segments".to_string(),
                        ));
                    }
                    if *index != next_index {
                        return Err(BeeError::MalformedEncoding(format!(
                            "manifest segment {index} out of order (expected {next_index})"
                        )));
                    }
                    next_index += 1;
                    expect_segment = false;
                }
                ManifestEntry::Reference(..) => {
                    if expect_segment {
                        return Err(BeeError::MalformedEncoding(
                            "manifest reference not preceded by a segment".to_string(),
                        ));
                    }
                    expect_segment = true;
                }
            }
        }
        if self.entries.is_empty() || expect_segment {
            return Err(BeeError::MalformedEncoding(
                "manifest must end with a segment".to_string(),
            ));
        }
        Ok(())
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &[u64])> {
        self.entries.iter().filter_map(|entry| match entry {
            ManifestEntry::Reference(hex, path) => Some((hex.as_str(), path.as_slice())),
            ManifestEntry::Segment(_) => None,
        })
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e, ManifestEntry::Segment(_))).count()
    }

    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.entries.len() - self.segment_count()
    }
}
