//! Network checkpoint persistence
//!
//! Weights are written through the network's `VarStore` (safetensors when the
//! path ends in `.safetensors`). A small JSON sidecar next to the weights
//! records where in training the snapshot was taken.

use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::RacingCNN;

/// Training progress stored alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Episode index at save time
    pub episode: usize,

    /// Running score at save time
    pub running_score: f64,

    /// PPO updates performed so far
    pub training_step: usize,
}

/// Saves and restores network parameters at a fixed path
#[derive(Debug, Clone)]
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    /// Create a checkpointer writing to `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Weights path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar metadata path (`<weights>.json`)
    pub fn meta_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Write weights and metadata, creating parent directories
    pub fn save(&self, policy: &RacingCNN, meta: &CheckpointMeta) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating checkpoint dir {}", parent.display()))?;
        }
        policy
            .save(&self.path)
            .with_context(|| format!("saving weights to {}", self.path.display()))?;

        let json = serde_json::to_string_pretty(meta)?;
        let mut file = File::create(self.meta_path())?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Save, logging instead of failing
    ///
    /// Returns whether the checkpoint was written.
    pub fn try_save(&self, policy: &RacingCNN, meta: &CheckpointMeta) -> bool {
        match self.save(policy, meta) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), episode = meta.episode, "checkpoint saved");
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "checkpoint save failed: {:#}", e);
                false
            }
        }
    }

    /// Restore weights into `policy`
    pub fn load(&self, policy: &mut RacingCNN) -> Result<()> {
        policy
            .load(&self.path)
            .with_context(|| format!("loading weights from {}", self.path.display()))
    }

    /// Read the metadata sidecar
    pub fn load_meta(&self) -> Result<CheckpointMeta> {
        let path = self.meta_path();
        let mut file =
            File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use tch::{Device, Kind, Tensor};

    use super::*;

    fn meta() -> CheckpointMeta {
        CheckpointMeta { episode: 20, running_score: 12.5, training_step: 3 }
    }

    #[test]
    fn test_roundtrip_creates_dirs() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let checkpointer =
            Checkpointer::new(temp_dir.path().join("param").join("net.safetensors"));

        tch::manual_seed(7);
        let net = RacingCNN::new(4, Device::Cpu);
        tch::manual_seed(8);
        let mut restored = RacingCNN::new(4, Device::Cpu);

        checkpointer.save(&net, &meta())?;
        checkpointer.load(&mut restored)?;
        assert_eq!(checkpointer.load_meta()?, meta());

        let obs = Tensor::rand([2, 4, 96, 96], (Kind::Float, Device::Cpu));
        let (_, a) = net.forward(&obs);
        let (_, b) = restored.forward(&obs);
        assert!(a.allclose(&b, 1e-6, 1e-6, false));
        Ok(())
    }

    #[test]
    fn test_try_save_reports_failure() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        // A regular file where a directory is needed
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"x")?;
        let checkpointer = Checkpointer::new(blocker.join("net.safetensors"));

        let net = RacingCNN::new(4, Device::Cpu);
        assert!(!checkpointer.try_save(&net, &meta()));
        Ok(())
    }

    #[test]
    fn test_load_missing_file_fails() {
        let checkpointer = Checkpointer::new("/nonexistent/net.safetensors");
        let mut net = RacingCNN::new(4, Device::Cpu);
        assert!(checkpointer.load(&mut net).is_err());
    }
}
