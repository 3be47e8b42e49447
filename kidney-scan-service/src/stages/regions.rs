use async_trait::async_trait;
use scan_flow::{Result, Stage, StageAction};

use super::{AnalysisContext, REGIONS_STAGE};
use crate::models::BoundingBox;

/// Nominal canvas the 3x3 grid is laid over, independent of the actual
/// upload resolution.
pub const CANVAS_WIDTH: f32 = 512.0;
pub const CANVAS_HEIGHT: f32 = 512.0;

/// Convert bounding boxes to directional region names on a 3x3 grid.
/// Duplicate names are suppressed; order follows the first occurrence in
/// box order.
pub fn map_boxes_to_regions(boxes: &[BoundingBox]) -> Vec<String> {
    map_with_canvas(boxes, CANVAS_WIDTH, CANVAS_HEIGHT)
}

fn map_with_canvas(boxes: &[BoundingBox], width: f32, height: f32) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();

    for bbox in boxes {
        let (x_center, y_center) = bbox.center();
        let region = region_for_center(x_center, y_center, width, height);
        if !regions.contains(&region) {
            regions.push(region);
        }
    }

    regions
}

fn region_for_center(x_center: f32, y_center: f32, width: f32, height: f32) -> String {
    let x_region = if x_center < width / 3.0 {
        "Left"
    } else if x_center < 2.0 * width / 3.0 {
        "Middle"
    } else {
        "Right"
    };

    let y_region = if y_center < height / 3.0 {
        "Top"
    } else if y_center < 2.0 * height / 3.0 {
        "Middle"
    } else {
        "Bottom"
    };

    if x_region != "Middle" || y_region != "Middle" {
        return format!("{y_region} {x_region}");
    }

    // Center cell: pick the nearest of the middle band's left edge, right
    // edge, and bottom edge instead of reporting "Middle Middle".
    let dist_to_left = x_center - width / 3.0;
    let dist_to_right = 2.0 * width / 3.0 - x_center;
    let dist_to_bottom = 2.0 * height / 3.0 - y_center;

    if dist_to_left < dist_to_right && dist_to_left < dist_to_bottom {
        "Middle Left".to_string()
    } else if dist_to_right <= dist_to_left && dist_to_right < dist_to_bottom {
        "Middle Right".to_string()
    } else {
        "Middle Down".to_string()
    }
}

/// Pipeline stage wrapping the pure mapping
pub struct RegionStage;

#[async_trait]
impl Stage<AnalysisContext> for RegionStage {
    fn id(&self) -> &str {
        REGIONS_STAGE
    }

    async fn run(&self, state: &mut AnalysisContext) -> Result<StageAction> {
        state.regions = map_boxes_to_regions(&state.boxes);
        Ok(StageAction::Continue)
    }
}
