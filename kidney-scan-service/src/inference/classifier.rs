use std::path::Path;

use anyhow::anyhow;
use image::{DynamicImage, imageops::FilterType};
use tract_onnx::prelude::*;

use super::Classifier;
use crate::models::KidneyClass;

const INPUT_SIZE: u32 = 224;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ONNX classifier: 224x224 RGB, ImageNet channel normalization, four output
/// scores. The winning label is the plain arg-max; ties resolve to the lowest
/// index.
pub struct OnnxClassifier {
    plan: TypedSimplePlan<TypedModel>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
                ),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &DynamicImage) -> anyhow::Result<KidneyClass> {
        let input = preprocess(image);
        let result = self.plan.run(tvec!(input.into_tensor().into()))?;

        let output = result[0].to_array_view::<f32>()?;
        let scores = output
            .as_slice()
            .ok_or_else(|| anyhow!("classifier output is not contiguous"))?;

        let index = argmax(scores).ok_or_else(|| anyhow!("classifier produced no scores"))?;
        KidneyClass::from_index(index)
            .ok_or_else(|| anyhow!("classifier produced out-of-range class index {index}"))
    }
}

fn preprocess(image: &DynamicImage) -> tract_ndarray::Array4<f32> {
    let resized = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    tract_ndarray::Array4::from_shape_fn(
        (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
        |(_, channel, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
            (value - MEAN[channel]) / STD[channel]
        },
    )
}

fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}
