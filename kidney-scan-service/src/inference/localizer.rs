use std::path::Path;

use anyhow::anyhow;
use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tract_onnx::prelude::*;

use super::Localizer;
use crate::models::{BoundingBox, Detection};

const DETECTOR_INPUT_SIZE: u32 = 640;
const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTLINE_WIDTH: u32 = 3;
/// Values per detection row in the post-processed detector output:
/// x1, y1, x2, y2, score, class.
const DETECTION_STRIDE: usize = 6;

/// ONNX object detector with embedded post-processing. The exported graph
/// already applies its own NMS; this wrapper only thresholds on confidence
/// and rescales boxes back to the source image's pixel space.
pub struct OnnxLocalizer {
    plan: TypedSimplePlan<TypedModel>,
}

impl OnnxLocalizer {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan })
    }
}

impl Localizer for OnnxLocalizer {
    fn detect(&self, image: &DynamicImage, confidence: f32) -> anyhow::Result<Vec<Detection>> {
        let input = preprocess(image);
        let result = self.plan.run(tvec!(input.into_tensor().into()))?;

        let output = result[0].to_array_view::<f32>()?;
        let rows = output
            .as_slice()
            .ok_or_else(|| anyhow!("detector output is not contiguous"))?;

        let scale_x = image.width() as f32 / DETECTOR_INPUT_SIZE as f32;
        let scale_y = image.height() as f32 / DETECTOR_INPUT_SIZE as f32;

        let mut detections = Vec::new();
        for row in rows.chunks_exact(DETECTION_STRIDE) {
            let score = row[4];
            if score < confidence {
                continue;
            }
            detections.push(Detection {
                bbox: BoundingBox::new(
                    row[0] * scale_x,
                    row[1] * scale_y,
                    row[2] * scale_x,
                    row[3] * scale_y,
                ),
                confidence: score,
            });
        }

        Ok(detections)
    }
}

fn preprocess(image: &DynamicImage) -> tract_ndarray::Array4<f32> {
    let resized = image
        .resize_exact(DETECTOR_INPUT_SIZE, DETECTOR_INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    tract_ndarray::Array4::from_shape_fn(
        (
            1,
            3,
            DETECTOR_INPUT_SIZE as usize,
            DETECTOR_INPUT_SIZE as usize,
        ),
        |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
    )
}

/// Draws red outline rectangles for each box onto a copy of the input image.
pub fn annotate(image: &DynamicImage, boxes: &[BoundingBox]) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for bbox in boxes {
        let x = bbox.x_min.max(0.0) as i32;
        let y = bbox.y_min.max(0.0) as i32;
        let width = (bbox.x_max - bbox.x_min).max(1.0) as u32;
        let height = (bbox.y_max - bbox.y_min).max(1.0) as u32;

        // imageproc draws one-pixel outlines; inset repeatedly for width
        for inset in 0..OUTLINE_WIDTH {
            if width <= 2 * inset || height <= 2 * inset {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32)
                .of_size(width - 2 * inset, height - 2 * inset);
            draw_hollow_rect_mut(&mut canvas, rect, OUTLINE_COLOR);
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_marks_box_outline_red() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([0, 0, 0])));
        let boxes = [BoundingBox::new(10.0, 10.0, 30.0, 30.0)];

        let canvas = annotate(&image, &boxes);

        assert_eq!(canvas.get_pixel(10, 10), &OUTLINE_COLOR);
        assert_eq!(canvas.get_pixel(12, 10), &OUTLINE_COLOR);
        // interior stays untouched
        assert_eq!(canvas.get_pixel(20, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn annotate_leaves_original_unchanged_without_boxes() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([5, 5, 5])));
        let canvas = annotate(&image, &[]);
        assert_eq!(canvas, image.to_rgb8());
    }
}
