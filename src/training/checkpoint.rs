//! Snapshots of every class-pair sub-model under one path prefix
//!
//! `<prefix>.meta` is a JSON manifest listing the saved pairs; each model's
//! parameters go to `<prefix>.pair-<a>-<b>` (the model chooses the extension).
//! Cross-validation keeps one snapshot per held-out house under
//! `<prefix>.house-<h>`, see [`Checkpoint::for_house`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::PairModel;
use crate::{ApplianceError, ClassPair, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    pairs: Vec<ClassPair>,
    saved_at: DateTime<Utc>,
}

/// Checkpoint location identified by a file-path prefix
#[derive(Debug, Clone)]
pub struct Checkpoint {
    prefix: PathBuf,
}

impl Checkpoint {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Checkpoint {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Snapshot of the models trained while `house` is held out
    ///
    /// Models trained for one held-out house have seen every other house's
    /// records, so each house resumes only from its own snapshot.
    pub fn for_house(&self, house: usize) -> Checkpoint {
        Checkpoint {
            prefix: self.with_suffix(&format!(".house-{}", house)),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.with_suffix(".meta")
    }

    fn model_path(&self, pair: ClassPair) -> PathBuf {
        self.with_suffix(&format!(".pair-{}-{}", pair.a, pair.b))
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut path = self.prefix.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }

    /// Whether a complete checkpoint has been written at this prefix
    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Write every model, then the manifest
    pub fn save<M: PairModel>(&self, models: &[M]) -> Result<()> {
        if let Some(parent) = self.prefix.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        for model in models {
            model.save(&self.model_path(model.pair()))?;
        }

        let manifest = Manifest {
            pairs: models.iter().map(|m| m.pair()).collect(),
            saved_at: Utc::now(),
        };
        std::fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        log::debug!(
            "Saved {} models to {}",
            models.len(),
            self.prefix.display()
        );
        Ok(())
    }

    /// Load every model from this checkpoint
    ///
    /// The manifest must list exactly the pairs of `models`, in order.
    pub fn restore<M: PairModel>(&self, ctx: &M::Context, models: &mut [M]) -> Result<()> {
        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(self.manifest_path())?)?;

        let pairs: Vec<ClassPair> = models.iter().map(|m| m.pair()).collect();
        if manifest.pairs != pairs {
            return Err(ApplianceError::Checkpoint(format!(
                "{} holds {} pair models that don't match the {} being trained",
                self.prefix.display(),
                manifest.pairs.len(),
                pairs.len()
            )));
        }

        for model in models.iter_mut() {
            let path = self.model_path(model.pair());
            model.load(ctx, &path)?;
        }

        log::info!(
            "Restored {} models from {} (saved {})",
            models.len(),
            self.prefix.display(),
            manifest.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    }
}
