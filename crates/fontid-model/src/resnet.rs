use std::fs;
use std::path::Path;

use burn::module::{Module, Param, RunningState};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::checkpoint::{IGNORED_SUFFIX, ParameterMap};
use crate::classifier::LoadReport;
use crate::ModelError;

/// Shape of the residual backbone.
///
/// [`ResNetConfig::resnet18`] matches torchvision's `resnet18`, including its
/// parameter names, so torchvision state dicts load directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResNetConfig {
    /// Output classes of the final linear layer.
    pub num_classes: usize,
    /// Channels of the first stage; doubled at each later stage.
    pub base_width: usize,
    /// Basic blocks per stage.
    pub blocks: [usize; 4],
}

impl ResNetConfig {
    pub fn resnet18(num_classes: usize) -> Self {
        Self {
            num_classes,
            base_width: 64,
            blocks: [2, 2, 2, 2],
        }
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_base_width(mut self, base_width: usize) -> Self {
        self.base_width = base_width;
        self
    }

    /// Features entering the classification layer.
    pub fn feature_width(&self) -> usize {
        self.base_width * 8
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let width = self.base_width;

        let conv1 = Conv2dConfig::new([3, width], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(width).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut layers = Vec::with_capacity(self.blocks.len());
        let mut in_channels = width;
        for (i, &count) in self.blocks.iter().enumerate() {
            let out_channels = width << i;
            let stride = if i == 0 { 1 } else { 2 };
            layers.push(Stage::new(in_channels, out_channels, count, stride, device));
            in_channels = out_channels;
        }

        ResNet {
            conv1,
            bn1,
            maxpool,
            layers,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(self.feature_width(), self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    maxpool: MaxPool2d,
    layers: Vec<Stage<B>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// `[batch, 3, H, W]` -> `[batch, num_classes]` logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(input)));
        let x = self.maxpool.forward(x);
        let x = self.layers.iter().fold(x, |x, stage| stage.forward(x));
        let x: Tensor<B, 2> = self.avgpool.forward(x).flatten(1, 3);
        self.fc.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        let [_, d_output] = self.fc.weight.val().dims();
        d_output
    }

    /// Copy matching tensors from `params` into this network.
    ///
    /// Names follow torchvision. Tensors whose name is unknown, or whose shape
    /// differs from the layer they target, are skipped and reported; layers
    /// without a tensor keep their initial values.
    pub fn load_parameters(self, params: ParameterMap, device: &B::Device) -> (Self, LoadReport) {
        let mut loader = ParamLoader::new(params, device);

        let conv1 = loader.conv("conv1", self.conv1);
        let bn1 = loader.batch_norm("bn1", self.bn1);
        let layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(i, stage)| stage.load(&format!("layer{}", i + 1), &mut loader))
            .collect();
        let fc = loader.linear("fc", self.fc);

        let net = Self {
            conv1,
            bn1,
            maxpool: self.maxpool,
            layers,
            avgpool: self.avgpool,
            fc,
        };
        (net, loader.finish())
    }
}

#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<BasicBlock<B>>,
}

impl<B: Backend> Stage<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        count: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let blocks = (0..count)
            .map(|j| {
                if j == 0 {
                    BasicBlock::new(in_channels, out_channels, stride, device)
                } else {
                    BasicBlock::new(out_channels, out_channels, 1, device)
                }
            })
            .collect();
        Self { blocks }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(input, |x, block| block.forward(x))
    }

    fn load(self, prefix: &str, loader: &mut ParamLoader<'_, B>) -> Self {
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(j, block)| block.load(&format!("{}.{}", prefix, j), loader))
            .collect();
        Self { blocks }
    }
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = (stride != 1 || in_channels != out_channels).then(|| Downsample {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
        });

        Self {
            conv1: conv3x3(in_channels, out_channels, stride, device),
            bn1: BatchNormConfig::new(out_channels).init(device),
            conv2: conv3x3(out_channels, out_channels, 1, device),
            bn2: BatchNormConfig::new(out_channels).init(device),
            downsample,
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(input)));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + identity)
    }

    fn load(self, prefix: &str, loader: &mut ParamLoader<'_, B>) -> Self {
        Self {
            conv1: loader.conv(&format!("{}.conv1", prefix), self.conv1),
            bn1: loader.batch_norm(&format!("{}.bn1", prefix), self.bn1),
            conv2: loader.conv(&format!("{}.conv2", prefix), self.conv2),
            bn2: loader.batch_norm(&format!("{}.bn2", prefix), self.bn2),
            downsample: self.downsample.map(|d| Downsample {
                conv: loader.conv(&format!("{}.downsample.0", prefix), d.conv),
                bn: loader.batch_norm(&format!("{}.downsample.1", prefix), d.bn),
            }),
        }
    }
}

#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }
}

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

/// Hands out checkpoint tensors by name and keeps track of what was used.
struct ParamLoader<'d, B: Backend> {
    params: ParameterMap,
    device: &'d B::Device,
    report: LoadReport,
}

impl<'d, B: Backend> ParamLoader<'d, B> {
    fn new(params: ParameterMap, device: &'d B::Device) -> Self {
        Self {
            params,
            device,
            report: LoadReport::default(),
        }
    }

    fn tensor<const D: usize>(&mut self, name: String, expected: [usize; D]) -> Option<Tensor<B, D>> {
        match self.params.remove(&name) {
            None => {
                self.report.missing.push(name);
                None
            }
            Some(param) if param.shape.as_slice() != expected.as_slice() => {
                self.report.mismatched.push(format!(
                    "{} (expected {:?}, found {:?})",
                    name, expected, param.shape
                ));
                None
            }
            Some(param) => Some(Tensor::from_data(param.into_data(), self.device)),
        }
    }

    fn param<const D: usize>(&mut self, name: String, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let dims = param.val().dims();
        match self.tensor(name, dims) {
            Some(tensor) => Param::from_tensor(tensor),
            None => param,
        }
    }

    fn conv(&mut self, prefix: &str, mut conv: Conv2d<B>) -> Conv2d<B> {
        conv.weight = self.param(format!("{}.weight", prefix), conv.weight);
        conv.bias = conv.bias.map(|bias| self.param(format!("{}.bias", prefix), bias));
        conv
    }

    fn batch_norm(&mut self, prefix: &str, mut bn: BatchNorm<B, 2>) -> BatchNorm<B, 2> {
        bn.gamma = self.param(format!("{}.weight", prefix), bn.gamma);
        bn.beta = self.param(format!("{}.bias", prefix), bn.beta);

        let dims = bn.running_mean.value().dims();
        if let Some(mean) = self.tensor(format!("{}.running_mean", prefix), dims) {
            bn.running_mean = RunningState::new(mean);
        }
        if let Some(var) = self.tensor(format!("{}.running_var", prefix), dims) {
            bn.running_var = RunningState::new(var);
        }
        bn
    }

    /// PyTorch stores linear weights as `[out, in]`; burn as `[in, out]`.
    fn linear(&mut self, prefix: &str, mut linear: Linear<B>) -> Linear<B> {
        let [d_input, d_output] = linear.weight.val().dims();
        if let Some(weight) = self.tensor::<2>(format!("{}.weight", prefix), [d_output, d_input]) {
            linear.weight = Param::from_tensor(weight.transpose());
        }
        linear.bias = linear.bias.map(|bias| self.param(format!("{}.bias", prefix), bias));
        linear
    }

    fn finish(mut self) -> LoadReport {
        self.report.unexpected = self
            .params
            .into_keys()
            .filter(|name| !name.ends_with(IGNORED_SUFFIX))
            .collect();
        self.report
    }
}

/// Restore a network written by [`save_full_model`].
///
/// The record replaces every tensor of the freshly built network, so the
/// classification layer takes the width stored in the record.
pub fn load_full_model<B: Backend>(
    bytes: Vec<u8>,
    config: &ResNetConfig,
    device: &B::Device,
) -> Result<ResNet<B>, ModelError> {
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let record: <ResNet<B> as Module<B>>::Record =
        <NamedMpkBytesRecorder<FullPrecisionSettings> as Recorder<B>>::load(&recorder, bytes, device)
            .map_err(|e| ModelError::Load(format!("{:?}", e)))?;

    Ok(config.init::<B>(device).load_record(record))
}

/// Write the whole network as a named MessagePack record.
pub fn save_full_model<B: Backend>(model: &ResNet<B>, path: &Path) -> Result<(), ModelError> {
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let bytes = <NamedMpkBytesRecorder<FullPrecisionSettings> as Recorder<B>>::record(
        &recorder,
        model.clone().into_record(),
        (),
    )
    .map_err(|e| ModelError::Load(format!("{:?}", e)))?;

    fs::write(path, bytes).map_err(|e| ModelError::io(path, e))
}
