use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use image::DynamicImage;
use tracing::{debug, info};

use crate::preprocess::Preprocessor;
use crate::resnet::ResNet;
use crate::ModelError;

/// A runnable classifier.
#[derive(Debug)]
pub enum Classifier<B: Backend> {
    /// Stand-in used when no artifact exists. Always emits zero logits.
    Placeholder { num_classes: usize },
    Network(ResNet<B>),
}

impl<B: Backend> Classifier<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Classifier::Placeholder { num_classes } => {
                let [batch, _, _, _] = input.dims();
                Tensor::zeros([batch, *num_classes], &input.device())
            }
            Classifier::Network(net) => net.forward(input),
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Classifier::Placeholder { num_classes } => *num_classes,
            Classifier::Network(net) => net.num_classes(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Classifier::Placeholder { .. })
    }
}

/// What a non-strict parameter load could not place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Network parameters with no tensor in the checkpoint.
    pub missing: Vec<String>,
    /// Checkpoint tensors that match no network parameter.
    pub unexpected: Vec<String>,
    /// Checkpoint tensors whose shape differs from the parameter they name.
    pub mismatched: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.mismatched.is_empty()
    }

    pub(crate) fn log(&self) {
        if self.is_clean() {
            debug!("All checkpoint parameters loaded");
            return;
        }
        if !self.unexpected.is_empty() {
            info!("Loaded with unexpected keys: {:?}", self.unexpected);
        }
        if !self.missing.is_empty() {
            info!("Loaded with missing keys: {:?}", self.missing);
        }
        if !self.mismatched.is_empty() {
            info!("Skipped keys with mismatched shapes: {:?}", self.mismatched);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Softmax probability of `label`, in `[0, 1]`.
    pub confidence: f32,
}

/// Classify one image.
///
/// Runs on whatever backend the classifier was built for; an inference
/// backend (no autodiff) keeps gradients untracked and batch norm on its
/// running statistics.
pub fn predict<B: Backend>(
    image: &DynamicImage,
    classifier: &Classifier<B>,
    labels: &[String],
    preprocessor: &dyn Preprocessor,
    device: &B::Device,
) -> Result<Prediction, ModelError> {
    let input: Tensor<B, 4> =
        Tensor::<B, 3>::from_data(preprocessor.preprocess(image), device).unsqueeze();

    let probs = softmax(classifier.forward(input), 1)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ModelError::Inference(format!("{:?}", e)))?;

    let (index, confidence) = argmax(&probs)
        .ok_or_else(|| ModelError::Inference("classifier produced no outputs".into()))?;

    let label = labels.get(index).cloned().ok_or_else(|| {
        ModelError::Inference(format!(
            "class index {} outside label list of {}",
            index,
            labels.len()
        ))
    })?;

    Ok(Prediction { label, confidence })
}

/// First index holding the maximum.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{ParamTensor, ParameterMap};
    use crate::preprocess::ResizeToTensor;
    use crate::resnet::ResNetConfig;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 32, |x, y| {
            Rgb([(x * 4) as u8, (y * 8) as u8, 128])
        }))
    }

    fn small_config(num_classes: usize) -> ResNetConfig {
        ResNetConfig::resnet18(num_classes).with_base_width(4)
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some((1, 0.5)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_placeholder_is_uniform() {
        let device = Default::default();
        let names = labels(&["Arial", "Helvetica", "Georgia"]);
        let classifier = Classifier::<TestBackend>::Placeholder { num_classes: 3 };

        let prediction =
            predict(&sample_image(), &classifier, &names, &ResizeToTensor, &device).unwrap();

        assert!(names.contains(&prediction.label));
        assert!((prediction.confidence - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_network_prediction_in_range() {
        let device = Default::default();
        let names = labels(&["A", "B", "C", "D"]);
        let classifier = Classifier::Network(small_config(4).init::<TestBackend>(&device));
        assert_eq!(classifier.num_classes(), 4);

        let prediction =
            predict(&sample_image(), &classifier, &names, &ResizeToTensor, &device).unwrap();

        assert!(names.contains(&prediction.label));
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }

    #[test]
    fn test_label_list_shorter_than_outputs() {
        let device = Default::default();
        let classifier = Classifier::<TestBackend>::Placeholder { num_classes: 3 };

        let err = predict(&sample_image(), &classifier, &[], &ResizeToTensor, &device)
            .unwrap_err();
        assert!(matches!(err, ModelError::Inference(_)));
    }

    #[test]
    fn test_non_strict_parameter_load() {
        let device = Default::default();
        let config = small_config(3);
        let net = config.init::<TestBackend>(&device);

        let mut params = ParameterMap::new();
        // zero weights + biased class 1: logits are the bias regardless of input
        params.insert(
            "fc.weight".into(),
            ParamTensor::filled(vec![3, config.feature_width()], 0.0),
        );
        params.insert("fc.bias".into(), ParamTensor::new(vec![3], vec![0.0, 5.0, 0.0]));
        params.insert("conv1.weight".into(), ParamTensor::filled(vec![1, 1], 0.0));
        params.insert("head.extra.weight".into(), ParamTensor::filled(vec![2], 1.0));
        params.insert("bn1.num_batches_tracked".into(), ParamTensor::filled(vec![1], 0.0));

        let (net, report) = net.load_parameters(params, &device);

        assert_eq!(report.unexpected, vec!["head.extra.weight".to_string()]);
        assert_eq!(report.mismatched.len(), 1);
        assert!(report.mismatched[0].starts_with("conv1.weight"));
        assert!(report.missing.contains(&"layer1.0.conv1.weight".to_string()));
        assert!(report.missing.contains(&"layer2.0.downsample.0.weight".to_string()));
        assert!(!report.missing.contains(&"fc.weight".to_string()));
        assert!(!report.missing.contains(&"conv1.weight".to_string()));

        let names = labels(&["Arial", "Helvetica", "Georgia"]);
        let prediction = predict(
            &sample_image(),
            &Classifier::Network(net),
            &names,
            &ResizeToTensor,
            &device,
        )
        .unwrap();

        assert_eq!(prediction.label, "Helvetica");
        assert!(prediction.confidence > 0.98);
    }

    #[test]
    fn test_every_layer_named_like_torchvision() {
        let device = Default::default();
        let net = small_config(2).init::<TestBackend>(&device);
        let (_, report) = net.load_parameters(ParameterMap::new(), &device);

        assert!(report.missing.contains(&"bn1.running_var".to_string()));
        assert!(report.missing.contains(&"layer4.1.bn2.bias".to_string()));
        assert!(report.missing.contains(&"fc.bias".to_string()));
        assert!(!report.missing.iter().any(|n| n.starts_with("layer1.0.downsample")));
        let downsample_convs = report
            .missing
            .iter()
            .filter(|n| n.ends_with("downsample.0.weight"))
            .count();
        assert_eq!(downsample_convs, 3);
    }
}
