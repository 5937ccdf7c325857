use std::rc::Rc;

use crate::data::{DataSet, Entity, Ring};
use crate::error::EngineError;
use crate::graph::{Graph, GraphBuilder};
use crate::metric::{Metric, MetricRegistry};
use crate::util::format_count;

pub mod encode;
pub mod layers;

use self::layers::{
    CircleLayer, CirclePoint, LabelLayer, LabelPoint, Layer, RegionLayer, RegionShape, RenderSink,
};

const DEFAULT_ACTIVE_METRIC: &str = "cases";
const DEFAULT_ACTIVE_METRICS: [&str; 3] = ["cases", "deaths", "delta_cases"];
const DEFAULT_CIRCLE_SCALE: f64 = 4000.0;

/// One county ring tagged with the active metric's per-entity value.
#[derive(Clone, Debug, PartialEq)]
struct RegionDatum {
    entity_id: String,
    ring: Rc<Ring>,
    value: u64,
}

/// The map's derived-state pipeline: primary state fields and the computed
/// nodes between raw entity data and the composed layer sequence. All
/// mutation goes through the setters; reads recompute lazily.
pub struct MapEngine {
    graph: Graph,
    data: Rc<DataSet>,
    registry: Rc<MetricRegistry>,
}

impl MapEngine {
    pub fn new(data: DataSet, registry: MetricRegistry) -> Result<Self, EngineError> {
        let data = Rc::new(data);
        let registry = Rc::new(registry);

        // Configuration errors surface here, not at read time.
        for key in DEFAULT_ACTIVE_METRICS {
            registry.get(key)?;
        }

        let mut builder = GraphBuilder::new();

        builder
            .input("data", data.clone())
            .input("day_index", Rc::new(data.num_days - 1))
            .input("active_metric", Rc::new(DEFAULT_ACTIVE_METRIC.to_string()))
            .input(
                "active_metrics",
                Rc::new(
                    DEFAULT_ACTIVE_METRICS
                        .iter()
                        .map(|key| key.to_string())
                        .collect::<Vec<_>>(),
                ),
            )
            .input("zoom", Rc::new(0.0f64))
            .input("initial_zoom", Rc::new(0.0f64))
            .input("circle_scale", Rc::new(DEFAULT_CIRCLE_SCALE))
            .input("retain_circle_size", Rc::new(true))
            .input("show_counties", Rc::new(true))
            .input("show_text_labels", Rc::new(true))
            .input("show_tooltips", Rc::new(true))
            .input("normalize_circles", Rc::new(true));

        builder.computed("metric", &["active_metric"], {
            let registry = registry.clone();
            move |args| {
                let key = args.get::<String>(0);
                let metric = registry.get(&key)?;
                Ok(Rc::new(metric))
            }
        });

        builder.computed("legend_metrics", &["active_metrics"], {
            let registry = registry.clone();
            move |args| {
                let keys = args.get::<Vec<String>>(0);
                let metrics = keys
                    .iter()
                    .map(|key| registry.get(key))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rc::new(metrics))
            }
        });

        builder.computed("zoom_scale", &["initial_zoom", "zoom"], |args| {
            let initial = *args.get::<f64>(0);
            let current = *args.get::<f64>(1);
            Ok(Rc::new(encode::zoom_scale(initial, current)))
        });

        builder.computed(
            "effective_circle_scale",
            &["circle_scale", "zoom_scale", "retain_circle_size"],
            |args| {
                let scale = *args.get::<f64>(0);
                let zoom_scale = *args.get::<f64>(1);
                let retain = *args.get::<bool>(2);
                Ok(Rc::new(if retain { scale * zoom_scale } else { scale }))
            },
        );

        builder.computed("renderable_counties", &["data"], |args| {
            let data = args.get::<DataSet>(0);
            Ok(Rc::new(renderable_indices(&data.counties)))
        });

        builder.computed("renderable_states", &["data"], |args| {
            let data = args.get::<DataSet>(0);
            Ok(Rc::new(renderable_indices(&data.states)))
        });

        builder.computed(
            "county_regions",
            &["data", "renderable_counties", "metric", "day_index"],
            |args| {
                let data = args.get::<DataSet>(0);
                let indices = args.get::<Vec<usize>>(1);
                let metric = *args.get::<Metric>(2);
                let day = *args.get::<usize>(3);

                // Flat expansion: an entity with N rings yields N records.
                let mut regions = Vec::new();
                for &index in indices.iter() {
                    let county = &data.counties[index];
                    let Some(geometry) = &county.geometry else {
                        continue;
                    };
                    let value = metric.per_entity_at(county, day);
                    for ring in &geometry.rings {
                        regions.push(RegionDatum {
                            entity_id: county.id.clone(),
                            ring: ring.clone(),
                            value,
                        });
                    }
                }
                Ok(Rc::new(regions))
            },
        );

        builder.computed(
            "county_circles",
            &["data", "renderable_counties", "metric", "day_index"],
            |args| {
                let data = args.get::<DataSet>(0);
                let indices = args.get::<Vec<usize>>(1);
                let metric = *args.get::<Metric>(2);
                let day = *args.get::<usize>(3);

                let mut points = Vec::with_capacity(indices.len());
                for &index in indices.iter() {
                    let county = &data.counties[index];
                    let Some(geometry) = &county.geometry else {
                        continue;
                    };
                    points.push(CirclePoint {
                        entity_id: county.id.clone(),
                        position: geometry.centroid,
                        radius: encode::circle_radius(metric.per_entity_at(county, day)),
                    });
                }
                Ok(Rc::new(points))
            },
        );

        builder.computed("state_regions", &["data", "renderable_states"], |args| {
            let data = args.get::<DataSet>(0);
            let indices = args.get::<Vec<usize>>(1);

            let mut regions: Vec<(String, Rc<Ring>)> = Vec::new();
            for &index in indices.iter() {
                let state = &data.states[index];
                let Some(geometry) = &state.geometry else {
                    continue;
                };
                for ring in &geometry.rings {
                    regions.push((state.id.clone(), ring.clone()));
                }
            }
            Ok(Rc::new(regions))
        });

        builder.computed(
            "label_data",
            &[
                "data",
                "renderable_counties",
                "renderable_states",
                "metric",
                "day_index",
                "normalize_circles",
            ],
            |args| {
                let data = args.get::<DataSet>(0);
                let counties = args.get::<Vec<usize>>(1);
                let states = args.get::<Vec<usize>>(2);
                let metric = *args.get::<Metric>(3);
                let day = *args.get::<usize>(4);
                let normalize = *args.get::<bool>(5);

                let mut labels = Vec::new();
                for &index in counties.iter() {
                    let county = &data.counties[index];
                    let Some(geometry) = &county.geometry else {
                        continue;
                    };
                    let value = metric.per_entity_at(county, day);
                    if value == 0 {
                        continue;
                    }
                    labels.push(LabelPoint {
                        text: format!("{} {}", county.name, format_count(value)),
                        position: geometry.centroid,
                        weight: encode::label_weight(value),
                    });
                }

                // Short-code labels are weighted so density thresholding
                // never starves them out, whatever the current values are.
                let state_weight = if normalize {
                    encode::STATE_LABEL_WEIGHT
                } else {
                    metric.max_over_series(&data) as f64
                };
                for &index in states.iter() {
                    let state = &data.states[index];
                    let Some(geometry) = &state.geometry else {
                        continue;
                    };
                    let Some(code) = &state.short_code else {
                        continue;
                    };
                    labels.push(LabelPoint {
                        text: code.clone(),
                        position: geometry.centroid,
                        weight: state_weight,
                    });
                }
                Ok(Rc::new(labels))
            },
        );

        builder.computed("state_bg_layer", &["state_regions"], |args| {
            let regions = args.get::<Vec<(String, Rc<Ring>)>>(0);
            let shapes = regions
                .iter()
                .map(|(entity_id, ring)| RegionShape {
                    entity_id: entity_id.clone(),
                    ring: ring.clone(),
                    fill: encode::TRANSPARENT,
                    line: encode::TRANSPARENT,
                })
                .collect();
            Ok(Rc::new(Layer::Regions(RegionLayer {
                id: "state-bg-regions",
                filled: true,
                stroked: false,
                opacity: 1.0,
                line_width: 0.5,
                pickable: true,
                shapes,
            })))
        });

        builder.computed(
            "county_layer",
            &["county_regions", "data", "metric", "show_counties"],
            |args| {
                let regions = args.get::<Vec<RegionDatum>>(0);
                let data = args.get::<DataSet>(1);
                let metric = *args.get::<Metric>(2);
                let show_counties = *args.get::<bool>(3);

                let max_value = metric.max_over_series(&data);
                let shapes = regions
                    .iter()
                    .map(|region| RegionShape {
                        entity_id: region.entity_id.clone(),
                        ring: region.ring.clone(),
                        fill: encode::region_fill(region.value, max_value),
                        line: encode::region_line(region.value, max_value),
                    })
                    .collect();
                Ok(Rc::new(Layer::Regions(RegionLayer {
                    id: "county-regions",
                    filled: true,
                    stroked: true,
                    opacity: if show_counties { 1.0 } else { 0.0 },
                    line_width: 0.5,
                    pickable: true,
                    shapes,
                })))
            },
        );

        builder.computed("state_line_layer", &["state_regions"], |args| {
            let regions = args.get::<Vec<(String, Rc<Ring>)>>(0);
            let shapes = regions
                .iter()
                .map(|(entity_id, ring)| RegionShape {
                    entity_id: entity_id.clone(),
                    ring: ring.clone(),
                    fill: encode::TRANSPARENT,
                    line: encode::STATE_LINE,
                })
                .collect();
            Ok(Rc::new(Layer::Regions(RegionLayer {
                id: "state-regions",
                filled: false,
                stroked: true,
                opacity: 1.0,
                line_width: 0.5,
                pickable: false,
                shapes,
            })))
        });

        builder.computed(
            "circle_layer",
            &["county_circles", "effective_circle_scale"],
            |args| {
                let points = args.get::<Vec<CirclePoint>>(0);
                let effective_scale = *args.get::<f64>(1);
                Ok(Rc::new(Layer::Circles(CircleLayer {
                    id: "county-circles",
                    radius_scale: effective_scale / 100.0,
                    fill: encode::CIRCLE_FILL,
                    line: encode::CIRCLE_LINE,
                    line_width: 0.5,
                    pickable: true,
                    points: points.as_ref().clone(),
                })))
            },
        );

        builder.computed("text_layer", &["label_data", "show_text_labels"], |args| {
            let labels = args.get::<Vec<LabelPoint>>(0);
            let show_labels = *args.get::<bool>(1);
            Ok(Rc::new(Layer::Labels(LabelLayer {
                id: "text-labels",
                min_font_size: if show_labels { 10.0 } else { 0.0 },
                max_font_size: if show_labels { 14.0 } else { 0.0 },
                color: encode::LABEL_COLOR,
                weight_threshold: encode::LABEL_WEIGHT_THRESHOLD,
                labels: labels.as_ref().clone(),
            })))
        });

        // Painter order: later layers draw over earlier ones. Picking and
        // legibility depend on this sequence staying fixed.
        builder.computed(
            "layers",
            &[
                "state_bg_layer",
                "county_layer",
                "state_line_layer",
                "circle_layer",
                "text_layer",
            ],
            |args| {
                let layers = (0..5)
                    .map(|index| args.get::<Layer>(index).as_ref().clone())
                    .collect::<Vec<_>>();
                Ok(Rc::new(layers))
            },
        );

        let graph = builder.build()?;

        Ok(Self {
            graph,
            data,
            registry,
        })
    }

    /// Wires the external rendering engine: pushed a full replacement of the
    /// layer sequence once per write-batch, only when it actually changed.
    pub fn attach_sink<S: RenderSink + 'static>(&mut self, mut sink: S) -> Result<(), EngineError> {
        self.graph
            .subscribe::<Vec<Layer>, _>("layers", move |layers| sink.push_layers(layers))
    }

    pub fn layers(&mut self) -> Result<Rc<Vec<Layer>>, EngineError> {
        self.graph.read("layers")
    }

    pub fn legend_metrics(&mut self) -> Result<Rc<Vec<Metric>>, EngineError> {
        self.graph.read("legend_metrics")
    }

    /// Raw entity export: includes entities without geometry, which never
    /// appear in any layer.
    pub fn dataset(&self) -> &DataSet {
        &self.data
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn set_day_index(&mut self, day: usize) -> Result<(), EngineError> {
        if day >= self.data.num_days {
            return Err(EngineError::DayOutOfRange {
                index: day,
                num_days: self.data.num_days,
            });
        }
        self.graph.write("day_index", day)
    }

    pub fn set_active_metric(&mut self, key: &str) -> Result<(), EngineError> {
        self.registry.get(key)?;
        self.graph.write("active_metric", key.to_string())
    }

    pub fn set_active_metrics(&mut self, keys: &[&str]) -> Result<(), EngineError> {
        for key in keys {
            self.registry.get(key)?;
        }
        let keys = keys.iter().map(|key| key.to_string()).collect::<Vec<_>>();
        self.graph.write("active_metrics", keys)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), EngineError> {
        self.graph.write("zoom", zoom)
    }

    pub fn set_initial_zoom(&mut self, zoom: f64) -> Result<(), EngineError> {
        self.graph.write("initial_zoom", zoom)
    }

    pub fn set_circle_scale(&mut self, scale: f64) -> Result<(), EngineError> {
        self.graph.write("circle_scale", scale)
    }

    pub fn set_retain_circle_size(&mut self, retain: bool) -> Result<(), EngineError> {
        self.graph.write("retain_circle_size", retain)
    }

    pub fn set_show_counties(&mut self, show: bool) -> Result<(), EngineError> {
        self.graph.write("show_counties", show)
    }

    pub fn set_show_text_labels(&mut self, show: bool) -> Result<(), EngineError> {
        self.graph.write("show_text_labels", show)
    }

    pub fn set_show_tooltips(&mut self, show: bool) -> Result<(), EngineError> {
        self.graph.write("show_tooltips", show)
    }

    pub fn set_normalize_circles(&mut self, normalize: bool) -> Result<(), EngineError> {
        self.graph.write("normalize_circles", normalize)
    }

    pub fn day_index(&mut self) -> Result<usize, EngineError> {
        Ok(*self.graph.read::<usize>("day_index")?)
    }

    pub fn active_metric(&mut self) -> Result<Metric, EngineError> {
        Ok(*self.graph.read::<Metric>("metric")?)
    }

    pub fn is_active(&mut self, key: &str) -> Result<bool, EngineError> {
        Ok(*self.graph.read::<String>("active_metric")? == key)
    }

    pub fn show_tooltips(&mut self) -> Result<bool, EngineError> {
        Ok(*self.graph.read::<bool>("show_tooltips")?)
    }

    pub fn effective_circle_scale(&mut self) -> Result<f64, EngineError> {
        Ok(*self.graph.read::<f64>("effective_circle_scale")?)
    }

    pub fn total(&mut self) -> Result<u64, EngineError> {
        let metric = self.active_metric()?;
        let day = self.day_index()?;
        Ok(metric.total_at(&self.data, day))
    }

    pub fn max(&mut self) -> Result<u64, EngineError> {
        let metric = self.active_metric()?;
        Ok(metric.max_over_series(&self.data))
    }

    pub fn entity_value(&mut self, entity: &Entity) -> Result<u64, EngineError> {
        let metric = self.active_metric()?;
        let day = self.day_index()?;
        Ok(metric.per_entity_at(entity, day))
    }

    pub fn pluralize(&mut self, count: u64) -> Result<&'static str, EngineError> {
        Ok(self.active_metric()?.pluralize(count))
    }
}

fn renderable_indices(entities: &[Entity]) -> Vec<usize> {
    entities
        .iter()
        .enumerate()
        .filter(|(_, entity)| entity.renderable())
        .map(|(index, _)| index)
        .collect()
}
