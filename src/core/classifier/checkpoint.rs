// src/core/classifier/checkpoint.rs
//
// NPZ weight checkpoint loading. Two container shapes are accepted: a bare
// parameter map, and a trainer wrapper that nests the parameters under a
// `model_state_dict.` prefix next to metadata entries (epoch, best accuracy
// and the like). The shape is detected up front from the key set, not by
// probing individual entries.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Array4, ArrayD, Ix1, Ix2, Ix4};
use ndarray_npy::NpzReader;

use super::network::{BatchNorm2d, Conv2d, ConvBlock, HemorrhageNet, Linear, BLOCK_WIDTHS};

/// Prefix that marks the wrapped checkpoint form.
const WRAPPER_PREFIX: &str = "model_state_dict.";

/// Container shape of a checkpoint archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// Parameter names at the top level of the archive.
    Bare,
    /// Parameters nested under `model_state_dict.`, metadata alongside.
    Wrapped,
}

impl CheckpointFormat {
    /// Detect the container shape from the archive's entry names.
    pub fn detect(names: &[String]) -> Self {
        let wrapped = names
            .iter()
            .any(|n| n.trim_end_matches(".npy").starts_with(WRAPPER_PREFIX));
        if wrapped {
            CheckpointFormat::Wrapped
        } else {
            CheckpointFormat::Bare
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            CheckpointFormat::Bare => "",
            CheckpointFormat::Wrapped => WRAPPER_PREFIX,
        }
    }
}

struct ParamReader {
    npz: NpzReader<File>,
    names: Vec<String>,
    prefix: &'static str,
}

impl ParamReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open checkpoint {}", path.display()))?;
        let mut npz = NpzReader::new(file).context("checkpoint is not a valid NPZ archive")?;
        let names = npz.names().context("failed to list checkpoint entries")?;
        let prefix = CheckpointFormat::detect(&names).prefix();
        Ok(Self { npz, names, prefix })
    }

    /// Resolve a logical parameter name to the stored entry name, tolerating
    /// an optional `.npy` suffix in the archive listing.
    fn resolve(&self, logical: &str) -> Result<String> {
        let full = format!("{}{}", self.prefix, logical);
        self.names
            .iter()
            .find(|n| **n == full || n.trim_end_matches(".npy") == full)
            .cloned()
            .with_context(|| format!("checkpoint is missing parameter `{full}`"))
    }

    fn array(&mut self, logical: &str) -> Result<ArrayD<f32>> {
        let key = self.resolve(logical)?;
        self.npz
            .by_name(&key)
            .with_context(|| format!("failed to read parameter `{key}`"))
    }

    fn vec1(&mut self, logical: &str, len: usize) -> Result<Array1<f32>> {
        let arr = self
            .array(logical)?
            .into_dimensionality::<Ix1>()
            .with_context(|| format!("parameter `{logical}` is not 1-dimensional"))?;
        if arr.len() != len {
            bail!("parameter `{logical}` has length {}, expected {len}", arr.len());
        }
        Ok(arr)
    }

    fn mat2(&mut self, logical: &str, shape: (usize, usize)) -> Result<Array2<f32>> {
        let arr = self
            .array(logical)?
            .into_dimensionality::<Ix2>()
            .with_context(|| format!("parameter `{logical}` is not 2-dimensional"))?;
        if arr.dim() != shape {
            bail!(
                "parameter `{logical}` has shape {:?}, expected {:?}",
                arr.dim(),
                shape
            );
        }
        Ok(arr)
    }

    fn kernel4(&mut self, logical: &str, shape: (usize, usize, usize, usize)) -> Result<Array4<f32>> {
        let arr = self
            .array(logical)?
            .into_dimensionality::<Ix4>()
            .with_context(|| format!("parameter `{logical}` is not 4-dimensional"))?;
        if arr.dim() != shape {
            bail!(
                "parameter `{logical}` has shape {:?}, expected {:?}",
                arr.dim(),
                shape
            );
        }
        Ok(arr)
    }

    fn conv(&mut self, name: &str, out_c: usize, in_c: usize) -> Result<Conv2d> {
        Ok(Conv2d {
            weight: self.kernel4(&format!("{name}.weight"), (out_c, in_c, 3, 3))?,
            bias: self.vec1(&format!("{name}.bias"), out_c)?,
        })
    }

    fn batch_norm(&mut self, name: &str, channels: usize) -> Result<BatchNorm2d> {
        Ok(BatchNorm2d {
            weight: self.vec1(&format!("{name}.weight"), channels)?,
            bias: self.vec1(&format!("{name}.bias"), channels)?,
            running_mean: self.vec1(&format!("{name}.running_mean"), channels)?,
            running_var: self.vec1(&format!("{name}.running_var"), channels)?,
        })
    }

    fn linear(&mut self, name: &str, out_f: usize, in_f: usize) -> Result<Linear> {
        Ok(Linear {
            weight: self.mat2(&format!("{name}.weight"), (out_f, in_f))?,
            bias: self.vec1(&format!("{name}.bias"), out_f)?,
        })
    }
}

/// Load and validate a full parameter set from an NPZ checkpoint.
pub fn load(path: &Path) -> Result<HemorrhageNet> {
    let mut reader = ParamReader::open(path)?;

    let mut blocks = Vec::with_capacity(BLOCK_WIDTHS.len());
    for (i, &(in_c, out_c)) in BLOCK_WIDTHS.iter().enumerate() {
        let base = format!("features.block{}", i + 1);
        blocks.push(ConvBlock {
            conv1: reader.conv(&format!("{base}.conv1"), out_c, in_c)?,
            bn1: reader.batch_norm(&format!("{base}.bn1"), out_c)?,
            conv2: reader.conv(&format!("{base}.conv2"), out_c, out_c)?,
            bn2: reader.batch_norm(&format!("{base}.bn2"), out_c)?,
        });
    }

    Ok(HemorrhageNet {
        blocks,
        fc1: reader.linear("head.fc1", 128, 256)?,
        fc2: reader.linear("head.fc2", 64, 128)?,
        fc3: reader.linear("head.fc3", 2, 64)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::NpzWriter;
    use std::io::Write;

    fn write_full_checkpoint(path: &Path, prefix: &str) {
        let mut rng = rand::rng();
        let net = HemorrhageNet::random(&mut rng);
        let file = File::create(path).unwrap();
        let mut npz = NpzWriter::new(file);

        for (i, block) in net.blocks.iter().enumerate() {
            let base = format!("{prefix}features.block{}", i + 1);
            npz.add_array(format!("{base}.conv1.weight"), &block.conv1.weight)
                .unwrap();
            npz.add_array(format!("{base}.conv1.bias"), &block.conv1.bias)
                .unwrap();
            npz.add_array(format!("{base}.conv2.weight"), &block.conv2.weight)
                .unwrap();
            npz.add_array(format!("{base}.conv2.bias"), &block.conv2.bias)
                .unwrap();
            for (bn_name, bn) in [("bn1", &block.bn1), ("bn2", &block.bn2)] {
                npz.add_array(format!("{base}.{bn_name}.weight"), &bn.weight)
                    .unwrap();
                npz.add_array(format!("{base}.{bn_name}.bias"), &bn.bias)
                    .unwrap();
                npz.add_array(format!("{base}.{bn_name}.running_mean"), &bn.running_mean)
                    .unwrap();
                npz.add_array(format!("{base}.{bn_name}.running_var"), &bn.running_var)
                    .unwrap();
            }
        }
        for (name, fc) in [
            ("head.fc1", &net.fc1),
            ("head.fc2", &net.fc2),
            ("head.fc3", &net.fc3),
        ] {
            npz.add_array(format!("{prefix}{name}.weight"), &fc.weight).unwrap();
            npz.add_array(format!("{prefix}{name}.bias"), &fc.bias).unwrap();
        }
        if !prefix.is_empty() {
            // Trainer metadata the loader must skip over.
            npz.add_array("epoch".to_string(), &Array1::from_elem(1, 42.0f32))
                .unwrap();
            npz.add_array("best_val_acc".to_string(), &Array1::from_elem(1, 0.91f32))
                .unwrap();
        }
        npz.finish().unwrap();
    }

    #[test]
    fn test_format_detection() {
        let bare = vec!["features.block1.conv1.weight.npy".to_string()];
        assert_eq!(CheckpointFormat::detect(&bare), CheckpointFormat::Bare);

        let wrapped = vec![
            "epoch.npy".to_string(),
            "model_state_dict.features.block1.conv1.weight.npy".to_string(),
        ];
        assert_eq!(CheckpointFormat::detect(&wrapped), CheckpointFormat::Wrapped);
    }

    #[test]
    fn test_load_bare_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.npz");
        write_full_checkpoint(&path, "");
        let net = load(&path).unwrap();
        assert_eq!(net.blocks.len(), 4);
        assert_eq!(net.fc3.weight.dim(), (2, 64));
    }

    #[test]
    fn test_load_wrapped_checkpoint_unwraps_and_ignores_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrapped.npz");
        write_full_checkpoint(&path, WRAPPER_PREFIX);
        let net = load(&path).unwrap();
        assert_eq!(net.blocks[0].conv1.weight.dim(), (32, 1, 3, 3));
        assert_eq!(net.blocks[3].conv2.weight.dim(), (256, 256, 3, 3));
    }

    #[test]
    fn test_missing_parameter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.npz");
        let file = File::create(&path).unwrap();
        let mut npz = NpzWriter::new(file);
        npz.add_array("features.block1.conv1.weight", &Array4::<f32>::zeros((32, 1, 3, 3)))
            .unwrap();
        npz.finish().unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing parameter"));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.npz");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"not a zip archive").unwrap();
        drop(f);
        assert!(load(&path).is_err());
    }
}
