use crate::error::SourceError;
use crate::frame::BoundingBox;
use serde::Deserialize;

/// One line of a detection stream
#[derive(Debug, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    boxes: Vec<RawBox>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBox {
    /// `[x1, y1, x2, y2]` or `[x1, y1, x2, y2, confidence]`
    Corners(Vec<f32>),
    Named {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        #[serde(default = "full_confidence")]
        confidence: f32,
    },
}

fn full_confidence() -> f32 {
    1.0
}

impl RawBox {
    fn into_box(self, line: u64) -> Result<BoundingBox, SourceError> {
        match self {
            RawBox::Corners(values) => match values.as_slice() {
                [x1, y1, x2, y2] => Ok(BoundingBox::from_corners(*x1, *y1, *x2, *y2, 1.0)),
                [x1, y1, x2, y2, confidence] => Ok(BoundingBox::from_corners(
                    *x1,
                    *y1,
                    *x2,
                    *y2,
                    *confidence,
                )),
                other => Err(SourceError::Decode {
                    line,
                    details: format!("box needs 4 or 5 values, got {}", other.len()),
                }),
            },
            RawBox::Named {
                x1,
                y1,
                x2,
                y2,
                confidence,
            } => Ok(BoundingBox::from_corners(x1, y1, x2, y2, confidence)),
        }
    }
}

/// Decode the boxes of one frame record
pub fn parse_frame_record(text: &str, line: u64) -> Result<Vec<BoundingBox>, SourceError> {
    let record: FrameRecord = serde_json::from_str(text).map_err(|e| SourceError::Decode {
        line,
        details: e.to_string(),
    })?;

    record
        .boxes
        .into_iter()
        .map(|raw| raw.into_box(line))
        .collect()
}
