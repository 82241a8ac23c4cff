//! Directory-backed run registry.
//!
//! Layout:
//!
//! ```text
//! <dir>/registry.json          index of every version
//! <dir>/versions/<n>/bundle.bin
//! ```
//!
//! Bundle paths in the index are relative to `<dir>`, so the directory can be
//! opened under any spelling or moved as a whole.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ModelVersion, RunRecord, RunRegistry, Stage};
use crate::artifact::ArtifactBundle;
use crate::error::{PipelineError, Result};

const INDEX_FILE: &str = "registry.json";
const BUNDLE_FILE: &str = "bundle.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryIndex {
    #[serde(default = "default_index_version")]
    format_version: u32,
    next_version: u32,
    versions: Vec<ModelVersion>,
}

fn default_index_version() -> u32 {
    1
}

impl Default for RegistryIndex {
    fn default() -> Self {
        Self {
            format_version: default_index_version(),
            next_version: 1,
            versions: Vec::new(),
        }
    }
}

/// Run registry persisted as JSON plus bundle copies under one directory.
#[derive(Debug)]
pub struct FsRegistry {
    root: PathBuf,
    index: RegistryIndex,
}

impl FsRegistry {
    /// Open the registry at `root`, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let reader = BufReader::new(File::open(&index_path)?);
            serde_json::from_reader(reader)?
        } else {
            RegistryIndex::default()
        };
        tracing::debug!(
            root = %root.display(),
            versions = index.versions.len(),
            "opened run registry"
        );
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `version`'s bundle copy under this registry's root.
    pub fn artifact_path(&self, version: &ModelVersion) -> PathBuf {
        self.root.join(&version.artifact_path)
    }

    /// Write `index` to disk. Callers commit it to `self` only on success.
    fn save(&self, index: &RegistryIndex) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, index)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, self.root.join(INDEX_FILE))?;
        Ok(())
    }

    fn position(&self, version: u32) -> Result<usize> {
        self.index
            .versions
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(|| PipelineError::Registry(format!("unknown model version {}", version)))
    }
}

impl RunRegistry for FsRegistry {
    fn log_run(&mut self, record: RunRecord) -> Result<ModelVersion> {
        if !record.bundle_path.is_file() {
            return Err(PipelineError::Registry(format!(
                "bundle {} does not exist",
                record.bundle_path.display()
            )));
        }

        let version = self.index.next_version;
        let artifact_path = Path::new("versions")
            .join(version.to_string())
            .join(BUNDLE_FILE);
        let target = self.root.join(&artifact_path);
        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::copy(&record.bundle_path, &target)?;

        let entry = ModelVersion {
            version,
            stage: Stage::None,
            created_at: Utc::now(),
            run: record,
            artifact_path,
        };
        let mut index = self.index.clone();
        index.versions.push(entry.clone());
        index.next_version = version + 1;
        self.save(&index)?;
        self.index = index;

        tracing::info!(
            version,
            train_rmse = entry.run.metrics.train_rmse,
            eval_rmse = entry.run.metrics.eval_rmse,
            "logged run"
        );
        Ok(entry)
    }

    fn transition(
        &mut self,
        version: u32,
        stage: Stage,
        archive_existing: bool,
    ) -> Result<ModelVersion> {
        let pos = self.position(version)?;
        let mut index = self.index.clone();
        let mut archived = Vec::new();
        if archive_existing && matches!(stage, Stage::Staging | Stage::Production) {
            for other in index.versions.iter_mut() {
                if other.version != version && other.stage == stage {
                    other.stage = Stage::Archived;
                    archived.push(other.version);
                }
            }
        }
        let previous = index.versions[pos].stage;
        index.versions[pos].stage = stage;
        self.save(&index)?;
        self.index = index;

        for other in archived {
            tracing::info!(version = other, from = %stage, "archived model version");
        }
        tracing::info!(version, from = %previous, to = %stage, "transitioned model version");
        Ok(self.index.versions[pos].clone())
    }

    fn resolve(&self, stage: Stage) -> Result<ModelVersion> {
        self.index
            .versions
            .iter()
            .filter(|v| v.stage == stage)
            .max_by_key(|v| v.version)
            .cloned()
            .ok_or_else(|| PipelineError::Registry(format!("no model version in stage {}", stage)))
    }

    fn get(&self, version: u32) -> Result<ModelVersion> {
        self.position(version).map(|pos| self.index.versions[pos].clone())
    }

    fn list(&self) -> Result<Vec<ModelVersion>> {
        Ok(self.index.versions.clone())
    }

    fn load_bundle(&self, version: &ModelVersion) -> Result<ArtifactBundle> {
        ArtifactBundle::load_from_file(self.artifact_path(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RunMetrics, RunParams};
    use tempfile::tempdir;

    fn record(bundle_path: PathBuf, eval_rmse: f64) -> RunRecord {
        RunRecord {
            params: RunParams {
                categorical_cols: vec!["PULocationID".into()],
                min_duration: 1.0,
                max_duration: 60.0,
                model_version: "0.0.1".into(),
            },
            metrics: RunMetrics {
                train_rmse: 1.0,
                eval_rmse,
            },
            bundle_path,
        }
    }

    fn fake_bundle(dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes())?;
        Ok(path)
    }

    #[test]
    fn test_log_run_assigns_versions() -> Result<()> {
        let tmp = tempdir()?;
        let mut registry = FsRegistry::open(tmp.path().join("mlruns"))?;
        let a = registry.log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))?;
        let b = registry.log_run(record(fake_bundle(tmp.path(), "b.bin")?, 4.0))?;

        assert_eq!((a.version, b.version), (1, 2));
        assert_eq!(a.stage, Stage::None);
        assert_eq!(std::fs::read(registry.artifact_path(&b))?, b"b.bin");
        assert_eq!(registry.list()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_log_run_requires_bundle() -> Result<()> {
        let tmp = tempdir()?;
        let mut registry = FsRegistry::open(tmp.path())?;
        let result = registry.log_run(record(tmp.path().join("missing.bin"), 1.0));
        assert!(matches!(result, Err(PipelineError::Registry(_))));
        Ok(())
    }

    #[test]
    fn test_transition_and_resolve() -> Result<()> {
        let tmp = tempdir()?;
        let mut registry = FsRegistry::open(tmp.path().join("mlruns"))?;
        registry.log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))?;
        registry.log_run(record(fake_bundle(tmp.path(), "b.bin")?, 4.0))?;

        assert!(registry.resolve(Stage::Production).is_err());

        registry.transition(1, Stage::Production, false)?;
        assert_eq!(registry.resolve(Stage::Production)?.version, 1);

        registry.transition(2, Stage::Production, true)?;
        assert_eq!(registry.resolve(Stage::Production)?.version, 2);
        assert_eq!(registry.get(1)?.stage, Stage::Archived);
        Ok(())
    }

    #[test]
    fn test_transition_without_archiving_keeps_both() -> Result<()> {
        let tmp = tempdir()?;
        let mut registry = FsRegistry::open(tmp.path().join("mlruns"))?;
        registry.log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))?;
        registry.log_run(record(fake_bundle(tmp.path(), "b.bin")?, 4.0))?;
        registry.transition(1, Stage::Staging, false)?;
        registry.transition(2, Stage::Staging, false)?;

        assert_eq!(registry.get(1)?.stage, Stage::Staging);
        assert_eq!(registry.resolve(Stage::Staging)?.version, 2);
        Ok(())
    }

    #[test]
    fn test_unknown_version() -> Result<()> {
        let tmp = tempdir()?;
        let mut registry = FsRegistry::open(tmp.path())?;
        assert!(matches!(
            registry.transition(7, Stage::Staging, false),
            Err(PipelineError::Registry(_))
        ));
        assert!(registry.get(7).is_err());
        Ok(())
    }

    #[test]
    fn test_index_persists_across_opens() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path().join("mlruns");
        {
            let mut registry = FsRegistry::open(&root)?;
            registry.log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))?;
            registry.transition(1, Stage::Staging, false)?;
        }
        let mut reopened = FsRegistry::open(&root)?;
        assert_eq!(reopened.resolve(Stage::Staging)?.version, 1);
        let next = reopened.log_run(record(fake_bundle(tmp.path(), "b.bin")?, 3.0))?;
        assert_eq!(next.version, 2);
        Ok(())
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!("Production".parse::<Stage>(), Ok(Stage::Production));
        assert_eq!("staging".parse::<Stage>(), Ok(Stage::Staging));
        assert!("live".parse::<Stage>().is_err());
        assert_eq!(Stage::Archived.to_string(), "archived");
    }

    #[test]
    fn test_artifact_paths_survive_other_root_spellings() -> Result<()> {
        let tmp = tempdir()?;
        std::fs::create_dir_all(tmp.path().join("elsewhere"))?;
        {
            let mut registry = FsRegistry::open(tmp.path().join("mlruns"))?;
            let logged = registry.log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))?;
            assert!(logged.artifact_path.is_relative());
            assert_eq!(logged.artifact_path, Path::new("versions/1/bundle.bin"));
        }

        let detour = tmp.path().join("elsewhere").join("..").join("mlruns");
        let registry = FsRegistry::open(&detour)?;
        let version = registry.get(1)?;
        assert_eq!(std::fs::read(registry.artifact_path(&version))?, b"a.bin");

        std::fs::rename(tmp.path().join("mlruns"), tmp.path().join("moved"))?;
        let moved = FsRegistry::open(tmp.path().join("moved"))?;
        assert_eq!(std::fs::read(moved.artifact_path(&moved.get(1)?))?, b"a.bin");
        Ok(())
    }

    #[test]
    fn test_failed_save_leaves_index_untouched() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path().join("mlruns");
        let mut registry = FsRegistry::open(&root)?;
        let blocker = root.join(format!("{}.tmp", INDEX_FILE));
        std::fs::create_dir_all(&blocker)?;

        assert!(registry
            .log_run(record(fake_bundle(tmp.path(), "a.bin")?, 5.0))
            .is_err());
        assert!(registry.list()?.is_empty());

        std::fs::remove_dir(&blocker)?;
        let logged = registry.log_run(record(fake_bundle(tmp.path(), "b.bin")?, 4.0))?;
        assert_eq!(logged.version, 1);

        std::fs::create_dir_all(&blocker)?;
        assert!(registry.transition(1, Stage::Production, false).is_err());
        assert_eq!(registry.get(1)?.stage, Stage::None);
        Ok(())
    }
}
