//! Font classifier loading and single-image inference.
//!
//! The classifier artifact can arrive in several shapes. [`Checkpoint::decode`]
//! settles which one it is before any weights are touched, and
//! [`ModelContext`] memoizes the resulting [`LoadedModel`] so the artifact is
//! read at most once per context.
//!
//! ```ignore
//! use burn::backend::NdArray;
//! use fontid_model::{ModelContext, ModelPaths, ResizeToTensor};
//!
//! let context = ModelContext::<NdArray>::new(ModelPaths::default(), Default::default());
//! let model = context.load_model_and_classes()?;
//! let prediction = model.predict(&image, &ResizeToTensor)?;
//! ```

mod checkpoint;
mod classifier;
mod context;
mod error;
mod labels;
mod preprocess;
mod resnet;

pub use checkpoint::{Checkpoint, ParamTensor, ParameterMap, STATE_DICT_KEY};
pub use classifier::{Classifier, LoadReport, Prediction, predict};
pub use context::{LoadedModel, ModelContext, ModelPaths, ModelSource};
pub use error::ModelError;
pub use labels::{PLACEHOLDER_CLASS_COUNT, placeholder_class_names, read_class_names};
pub use preprocess::{GrayscaleNormalize, INPUT_SIZE, Preprocessor, ResizeToTensor};
pub use resnet::{ResNet, ResNetConfig, load_full_model, save_full_model};

/// CPU backend used for serving. It carries no autodiff, so inference never
/// records gradients.
pub type InferenceBackend = burn::backend::NdArray<f32>;
