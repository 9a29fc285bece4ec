//! Reference template library
//!
//! One immutable reference sequence per test type. Loaded once at startup
//! from `<root>/templates/<test-type>.json` and handed to the engine; tests
//! build libraries in memory with [`ReferenceLibrary::insert`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use mosim_common::{Error, LandmarkFrame, Result, Sequence, SequenceRole, TestType, TrackingModel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::channels::MIN_FRAMES;

/// On-disk template format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    #[serde(default)]
    pub model: TrackingModel,
    pub frames: Vec<LandmarkFrame>,
}

/// Summary of one loaded template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub test_type: TestType,
    pub model: TrackingModel,
    pub frames: usize,
    pub landmarks: usize,
}

/// Lookup table test type → reference sequence
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    templates: BTreeMap<TestType, Arc<Sequence>>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the reference for `sequence.test_type`
    pub fn insert(&mut self, mut sequence: Sequence) {
        sequence.role = SequenceRole::Reference;
        self.templates
            .insert(sequence.test_type.clone(), Arc::new(sequence));
    }

    pub fn get(&self, test_type: &TestType) -> Option<Arc<Sequence>> {
        self.templates.get(test_type).cloned()
    }

    /// Test types with a reference, sorted
    pub fn test_types(&self) -> Vec<TestType> {
        self.templates.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<TemplateInfo> {
        self.templates
            .values()
            .map(|s| TemplateInfo {
                test_type: s.test_type.clone(),
                model: s.model,
                frames: s.len(),
                landmarks: s.landmark_count(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load every `*.json` template in `dir`.
    ///
    /// A missing directory yields an empty library. A template that does not
    /// parse, has fewer than two frames or changes topology mid-sequence is
    /// a configuration error, as is two files normalising to the same test
    /// type.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut library = Self::new();
        if !dir.is_dir() {
            warn!("Template directory {} not found, no references loaded", dir.display());
            return Ok(library);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::Config(format!("Bad template file name {}", path.display())))?;
            let test_type = TestType::parse(stem)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

            let content = std::fs::read_to_string(&path)?;
            let file: TemplateFile = serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

            let sequence = Sequence::new(SequenceRole::Reference, test_type.clone(), file.model, file.frames);
            validate_template(&sequence)
                .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;

            if library.templates.contains_key(&test_type) {
                return Err(Error::Config(format!(
                    "{} duplicates the template for '{}'",
                    path.display(),
                    test_type
                )));
            }

            info!(
                test_type = %test_type,
                model = %sequence.model,
                frames = sequence.len(),
                "Loaded reference template"
            );
            library.insert(sequence);
        }

        Ok(library)
    }
}

fn validate_template(sequence: &Sequence) -> std::result::Result<(), String> {
    if sequence.len() < MIN_FRAMES {
        return Err(format!(
            "template has {} frame(s), at least {} required",
            sequence.len(),
            MIN_FRAMES
        ));
    }
    if sequence.landmark_count() == 0 {
        return Err("template frames carry no landmarks".to_string());
    }
    if let Some((frame, count)) = sequence.first_inconsistent_frame() {
        return Err(format!(
            "frame {} has {} landmark(s), expected {}",
            frame,
            count,
            sequence.landmark_count()
        ));
    }
    if let Some(expected) = sequence.model.landmark_count() {
        if sequence.landmark_count() != expected {
            return Err(format!(
                "{} templates need {} landmarks, found {}",
                sequence.model,
                expected,
                sequence.landmark_count()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_template(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    const TWO_FRAMES: &str = r#"{"frames": [[{"x":0,"y":0}], [{"x":1,"y":1}]]}"#;

    #[test]
    fn loads_and_normalises_names() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "Finger_Tapping.json", TWO_FRAMES);
        write_template(dir.path(), "notes.txt", "ignored");

        let library = ReferenceLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.len(), 1);
        let t = TestType::parse("finger-tapping").unwrap();
        let seq = library.get(&t).unwrap();
        assert_eq!(seq.role, SequenceRole::Reference);
        assert_eq!(seq.model, TrackingModel::Generic);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn missing_directory_is_empty() {
        let library = ReferenceLibrary::load_dir(Path::new("/nonexistent/templates")).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn short_template_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "stand-and-sit.json", r#"{"frames": [[{"x":0,"y":0}]]}"#);
        assert!(matches!(
            ReferenceLibrary::load_dir(dir.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn model_topology_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "fist-open-close.json",
            r#"{"model": "hands", "frames": [[{"x":0,"y":0}], [{"x":1,"y":1}]]}"#,
        );
        assert!(ReferenceLibrary::load_dir(dir.path()).is_err());
    }

    #[test]
    fn aliases_collide() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "finger-tap.json", TWO_FRAMES);
        write_template(dir.path(), "finger-tapping.json", TWO_FRAMES);
        assert!(ReferenceLibrary::load_dir(dir.path()).is_err());
    }
}
