use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use burn::tensor::TensorData;
use candle_core::{DType, Tensor as CandleTensor};
use tracing::debug;

use crate::ModelError;

/// Key under which training scripts commonly nest the parameter mapping.
pub const STATE_DICT_KEY: &str = "state_dict";

/// `torch.save` has written zip archives since PyTorch 1.6.
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// BatchNorm step counters carry no weights.
pub(crate) const IGNORED_SUFFIX: &str = "num_batches_tracked";

/// A dense f32 tensor lifted out of a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    pub fn filled(shape: Vec<usize>, value: f32) -> Self {
        let len = shape.iter().product();
        Self::new(shape, vec![value; len])
    }

    pub(crate) fn into_data(self) -> TensorData {
        TensorData::new(self.values, self.shape)
    }
}

impl TryFrom<&CandleTensor> for ParamTensor {
    type Error = candle_core::Error;

    fn try_from(tensor: &CandleTensor) -> Result<Self, Self::Error> {
        let shape = tensor.dims().to_vec();
        let values = tensor.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(Self { shape, values })
    }
}

/// Parameter name to tensor, ordered so load reports are stable.
pub type ParameterMap = BTreeMap<String, ParamTensor>;

/// The artifact after shape detection.
#[derive(Debug)]
pub enum Checkpoint {
    /// A complete classifier record written by [`crate::save_full_model`].
    FullModel(Vec<u8>),
    /// A flat parameter mapping at the top level of a PyTorch checkpoint.
    Parameters(ParameterMap),
    /// A parameter mapping found under [`STATE_DICT_KEY`].
    NestedParameters(ParameterMap),
}

impl Checkpoint {
    /// Read `path` and classify it.
    ///
    /// Zip archives are PyTorch checkpoints and must yield parameter tensors,
    /// either nested under `state_dict` or at the top level. Anything else is
    /// taken to be a full-model record.
    pub fn decode(path: &Path) -> Result<Self, ModelError> {
        if !is_zip(path)? {
            let bytes = fs::read(path).map_err(|e| ModelError::io(path, e))?;
            debug!("{} is not a zip archive, treating as full model record", path.display());
            return Ok(Checkpoint::FullModel(bytes));
        }

        match read_parameters(path, Some(STATE_DICT_KEY)) {
            Ok(params) if !params.is_empty() => return Ok(Checkpoint::NestedParameters(params)),
            Ok(_) => {}
            Err(e) => debug!("No nested {} in {}: {}", STATE_DICT_KEY, path.display(), e),
        }

        let params = read_parameters(path, None)?;
        if params.is_empty() {
            return Err(ModelError::NoParameters(path.to_path_buf()));
        }
        Ok(Checkpoint::Parameters(params))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Checkpoint::FullModel(_) => "full model",
            Checkpoint::Parameters(_) => "parameter mapping",
            Checkpoint::NestedParameters(_) => "nested parameter mapping",
        }
    }
}

fn is_zip(path: &Path) -> Result<bool, ModelError> {
    let mut file = File::open(path).map_err(|e| ModelError::io(path, e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ModelError::io(path, e)),
    }
}

fn read_parameters(path: &Path, key: Option<&str>) -> Result<ParameterMap, ModelError> {
    let tensors = candle_core::pickle::read_all_with_key(path, key)
        .map_err(|e| ModelError::Decode(e.to_string()))?;

    let mut params = ParameterMap::new();
    for (name, tensor) in tensors {
        if name.ends_with(IGNORED_SUFFIX) {
            continue;
        }
        let param = ParamTensor::try_from(&tensor)
            .map_err(|e| ModelError::Decode(format!("{}: {}", name, e)))?;
        params.insert(name, param);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zip_is_full_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pth");
        fs::write(&path, b"\x93not a zip").unwrap();

        match Checkpoint::decode(&path).unwrap() {
            Checkpoint::FullModel(bytes) => assert_eq!(bytes, b"\x93not a zip"),
            other => panic!("unexpected variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_tiny_file_is_full_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pth");
        fs::write(&path, b"PK").unwrap();

        assert!(matches!(Checkpoint::decode(&path), Ok(Checkpoint::FullModel(_))));
    }

    #[test]
    fn test_corrupt_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pth");
        fs::write(&path, b"PK\x03\x04 truncated archive").unwrap();

        assert!(matches!(
            Checkpoint::decode(&path),
            Err(ModelError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Checkpoint::decode(&dir.path().join("absent.pth")),
            Err(ModelError::Io { .. })
        ));
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn assert_fixture_params(params: &ParameterMap) {
        let names: Vec<_> = params.keys().map(String::as_str).collect();
        assert_eq!(names, ["extra.weight", "fc.bias", "fc.weight"]);
        assert_eq!(params["fc.bias"], ParamTensor::new(vec![3], vec![0.0, 0.0, 5.0]));
        assert_eq!(params["fc.weight"].shape, vec![3, 32]);
    }

    #[test]
    fn test_flat_torch_checkpoint() {
        match Checkpoint::decode(&fixture("flat.pth")).unwrap() {
            Checkpoint::Parameters(params) => assert_fixture_params(&params),
            other => panic!("unexpected variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_nested_torch_checkpoint() {
        match Checkpoint::decode(&fixture("nested.pth")).unwrap() {
            Checkpoint::NestedParameters(params) => assert_fixture_params(&params),
            other => panic!("unexpected variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_param_tensor_from_candle() {
        let tensor = CandleTensor::new(&[[1f64, 2.0], [3.0, 4.0]], &candle_core::Device::Cpu).unwrap();
        let param = ParamTensor::try_from(&tensor).unwrap();
        assert_eq!(param.shape, vec![2, 2]);
        assert_eq!(param.values, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
