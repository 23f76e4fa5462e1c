use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use burn::tensor::backend::Backend;
use image::DynamicImage;
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::classifier::{Classifier, LoadReport, Prediction, predict};
use crate::labels::read_class_names;
use crate::preprocess::Preprocessor;
use crate::resnet::{ResNet, ResNetConfig, load_full_model};
use crate::ModelError;

/// Where the artifact and label list live.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub model: PathBuf,
    pub labels: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("model.pth"),
            labels: PathBuf::from("data").join("fontlist.txt"),
        }
    }
}

/// How the cached classifier came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// No artifact on disk; outputs are all zero.
    Placeholder,
    FullModel,
    Parameters { nested: bool, report: LoadReport },
    /// The artifact exists but could not be read; outputs are all zero.
    Unloadable(String),
}

/// A classifier paired with its labels, ready for inference.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    classifier: Mutex<Classifier<B>>,
    labels: Vec<String>,
    source: ModelSource,
    device: B::Device,
}

impl<B: Backend> LoadedModel<B> {
    pub fn new(
        classifier: Classifier<B>,
        labels: Vec<String>,
        source: ModelSource,
        device: B::Device,
    ) -> Self {
        Self {
            classifier: Mutex::new(classifier),
            labels,
            source,
            device,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.source,
            ModelSource::Placeholder | ModelSource::Unloadable(_)
        )
    }

    /// Classify one image. Concurrent callers take turns on the classifier.
    pub fn predict(
        &self,
        image: &DynamicImage,
        preprocessor: &dyn Preprocessor,
    ) -> Result<Prediction, ModelError> {
        let classifier = self
            .classifier
            .lock()
            .map_err(|e| ModelError::Inference(format!("classifier lock poisoned: {}", e)))?;
        predict(image, &classifier, &self.labels, preprocessor, &self.device)
    }
}

/// Owns the lazily loaded classifier.
///
/// The first successful [`ModelContext::load_model_and_classes`] call reads
/// the artifact; every later call returns the same `Arc`. The fill happens
/// under a lock, so racing first calls load once.
#[derive(Debug)]
pub struct ModelContext<B: Backend> {
    paths: ModelPaths,
    backbone: ResNetConfig,
    device: B::Device,
    cache: Mutex<Option<Arc<LoadedModel<B>>>>,
    loads: AtomicUsize,
}

impl<B: Backend> ModelContext<B> {
    pub fn new(paths: ModelPaths, device: B::Device) -> Self {
        Self {
            paths,
            backbone: ResNetConfig::resnet18(0),
            device,
            cache: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Replace the ResNet-18 backbone built for parameter checkpoints.
    /// The class count is always taken from the label list.
    pub fn with_backbone(mut self, backbone: ResNetConfig) -> Self {
        self.backbone = backbone;
        self
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Number of times the cache has been filled.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Load the classifier on first use and return the cached one after.
    ///
    /// An artifact that exists but cannot be loaded is logged and replaced by
    /// the placeholder, which is cached like any other result.
    pub fn load_model_and_classes(&self) -> Result<Arc<LoadedModel<B>>, ModelError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| ModelError::Load(format!("model cache lock poisoned: {}", e)))?;

        if let Some(model) = cache.as_ref() {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(self.load());
        self.loads.fetch_add(1, Ordering::SeqCst);
        *cache = Some(Arc::clone(&model));
        Ok(model)
    }

    fn load(&self) -> LoadedModel<B> {
        let labels = read_class_names(&self.paths.labels);
        let path = &self.paths.model;

        let (classifier, source) = if !path.exists() {
            warn!(
                "Model file not found at {}; predictions will be uniform",
                path.display()
            );
            (placeholder(&labels), ModelSource::Placeholder)
        } else {
            match self.load_network(&labels) {
                Ok((net, source)) => {
                    info!("Classifier ready with {} classes", labels.len());
                    (Classifier::Network(net), source)
                }
                Err(e) => {
                    error!(
                        "Failed to load model from {}: {}; predictions will be uniform",
                        path.display(),
                        e
                    );
                    (placeholder(&labels), ModelSource::Unloadable(e.to_string()))
                }
            }
        };

        LoadedModel::new(classifier, labels, source, self.device.clone())
    }

    fn load_network(&self, labels: &[String]) -> Result<(ResNet<B>, ModelSource), ModelError> {
        let config = self.backbone.clone().with_num_classes(labels.len());
        let path = &self.paths.model;

        let checkpoint = Checkpoint::decode(path)?;
        info!("Loading {} from {}", checkpoint.kind(), path.display());

        let loaded = match checkpoint {
            Checkpoint::FullModel(bytes) => {
                let net = load_full_model::<B>(bytes, &config, &self.device)?;
                if net.num_classes() != labels.len() {
                    warn!(
                        "Model has {} outputs but {} labels were read",
                        net.num_classes(),
                        labels.len()
                    );
                }
                (net, ModelSource::FullModel)
            }
            Checkpoint::Parameters(params) => {
                let (net, report) = config
                    .init::<B>(&self.device)
                    .load_parameters(params, &self.device);
                report.log();
                (net, ModelSource::Parameters { nested: false, report })
            }
            Checkpoint::NestedParameters(params) => {
                let (net, report) = config
                    .init::<B>(&self.device)
                    .load_parameters(params, &self.device);
                report.log();
                (net, ModelSource::Parameters { nested: true, report })
            }
        };
        Ok(loaded)
    }
}

fn placeholder<B: Backend>(labels: &[String]) -> Classifier<B> {
    Classifier::Placeholder {
        num_classes: labels.len(),
    }
}
