pub mod data;
pub mod error;
pub mod graph;
pub mod metric;
pub mod pipeline;
pub mod util;

pub use data::{DataSet, Entity, Geometry, Ring, Statistic, load_dataset};
pub use error::EngineError;
pub use metric::{Metric, MetricRegistry};
pub use pipeline::MapEngine;
pub use pipeline::layers::{Layer, PickEvent, RenderSink};
