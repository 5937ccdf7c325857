use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

pub type Ring = Vec<[f64; 2]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statistic {
    Cases,
    Deaths,
}

impl Statistic {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::Deaths => "deaths",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub centroid: [f64; 2],
    pub rings: Vec<Rc<Ring>>,
}

/// A county or state: immutable once loaded, only derived state changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub short_code: Option<String>,
    pub cases: Vec<u64>,
    pub deaths: Vec<u64>,
    pub geometry: Option<Geometry>,
}

impl Entity {
    pub fn series(&self, stat: Statistic) -> &[u64] {
        match stat {
            Statistic::Cases => &self.cases,
            Statistic::Deaths => &self.deaths,
        }
    }

    pub fn renderable(&self) -> bool {
        self.geometry.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct DataSet {
    pub counties: Vec<Entity>,
    pub states: Vec<Entity>,
    pub num_days: usize,
    total_cases: Vec<u64>,
    total_deaths: Vec<u64>,
}

impl DataSet {
    pub fn new(counties: Vec<Entity>, states: Vec<Entity>) -> Result<Self> {
        let num_days = counties
            .iter()
            .chain(states.iter())
            .map(|entity| entity.cases.len())
            .next()
            .unwrap_or(0);

        if num_days == 0 {
            return Err(anyhow!("dataset has no days"));
        }

        for entity in counties.iter().chain(states.iter()) {
            if entity.cases.len() != num_days || entity.deaths.len() != num_days {
                return Err(anyhow!(
                    "entity {} has series of inconsistent length (expected {num_days} days)",
                    entity.id
                ));
            }
        }

        let mut total_cases = vec![0u64; num_days];
        let mut total_deaths = vec![0u64; num_days];
        for county in &counties {
            for day in 0..num_days {
                total_cases[day] += county.cases[day];
                total_deaths[day] += county.deaths[day];
            }
        }

        Ok(Self {
            counties,
            states,
            num_days,
            total_cases,
            total_deaths,
        })
    }

    pub fn totals(&self, stat: Statistic) -> &[u64] {
        match stat {
            Statistic::Cases => &self.total_cases,
            Statistic::Deaths => &self.total_deaths,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawEntity {
    id: String,
    name: String,
    #[serde(default, rename = "shortCode", alias = "short_code")]
    short_code: Option<String>,
    #[serde(default)]
    cases: Vec<u64>,
    #[serde(default)]
    deaths: Vec<u64>,
    #[serde(default)]
    centroid: Option<[f64; 2]>,
    #[serde(default)]
    rings: Vec<Ring>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawDataSet {
    #[serde(default)]
    counties: Vec<RawEntity>,
    #[serde(default)]
    states: Vec<RawEntity>,
}

pub fn load_dataset(path: &Path) -> Result<DataSet> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset from {}", path.display()))?;

    let parsed: RawDataSet = serde_json::from_str(&raw)
        .with_context(|| format!("invalid dataset JSON in {}", path.display()))?;

    let counties = parsed.counties.into_iter().map(into_entity).collect();
    let states = parsed.states.into_iter().map(into_entity).collect();

    let dataset = DataSet::new(counties, states)?;
    log::info!(
        "loaded {} counties, {} states, {} days",
        dataset.counties.len(),
        dataset.states.len(),
        dataset.num_days
    );

    Ok(dataset)
}

fn into_entity(raw: RawEntity) -> Entity {
    // A record without a centroid carries no usable geometry, even if rings
    // are present; it stays in the dataset but never reaches the renderer.
    let geometry = raw.centroid.map(|centroid| Geometry {
        centroid,
        rings: raw.rings.into_iter().map(Rc::new).collect(),
    });

    Entity {
        id: raw.id,
        name: raw.name,
        short_code: raw.short_code,
        cases: raw.cases,
        deaths: raw.deaths,
        geometry,
    }
}
