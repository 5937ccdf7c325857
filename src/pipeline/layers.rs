use std::rc::Rc;

use serde::Serialize;

use crate::data::Ring;

pub type Rgba = [u8; 4];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionShape {
    pub entity_id: String,
    pub ring: Rc<Ring>,
    pub fill: Rgba,
    pub line: Rgba,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CirclePoint {
    pub entity_id: String,
    pub position: [f64; 2],
    pub radius: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelPoint {
    pub text: String,
    pub position: [f64; 2],
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionLayer {
    pub id: &'static str,
    pub filled: bool,
    pub stroked: bool,
    pub opacity: f64,
    pub line_width: f64,
    pub pickable: bool,
    pub shapes: Vec<RegionShape>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircleLayer {
    pub id: &'static str,
    pub radius_scale: f64,
    pub fill: Rgba,
    pub line: Rgba,
    pub line_width: f64,
    pub pickable: bool,
    pub points: Vec<CirclePoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelLayer {
    pub id: &'static str,
    pub min_font_size: f64,
    pub max_font_size: f64,
    pub color: Rgba,
    pub weight_threshold: f64,
    pub labels: Vec<LabelPoint>,
}

/// One renderable primitive collection. The composed sequence is ordered
/// back-to-front; the rendering collaborator must paint it in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Layer {
    Regions(RegionLayer),
    Circles(CircleLayer),
    Labels(LabelLayer),
}

impl Layer {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Regions(layer) => layer.id,
            Self::Circles(layer) => layer.id,
            Self::Labels(layer) => layer.id,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Regions(layer) => layer.shapes.len(),
            Self::Circles(layer) => layer.points.len(),
            Self::Labels(layer) => layer.labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Boundary to the external rendering engine: receives a full replacement of
/// the composed layer sequence whenever it changes, and is responsible for
/// diffing and animating the primitives it is handed.
pub trait RenderSink {
    fn push_layers(&mut self, layers: &[Layer]);
}

/// Pick/hover event reported back by the rendering collaborator for pickable
/// layers; passed through to the UI, never generated here.
#[derive(Clone, Debug, PartialEq)]
pub struct PickEvent {
    pub entity_id: String,
    pub screen_position: [f64; 2],
}
