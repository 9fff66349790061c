//! Python bindings, built with the `python` feature.

use crate::centrality::{Metric, MetricConfig, MetricSet, Normalization, Radius};
use crate::graph::{DistanceMode, NetworkStructure, NodeAttributes};
use ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

impl From<crate::Error> for PyErr {
    fn from(err: crate::Error) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn build_config(
    metrics: Vec<String>,
    radius: f64,
    analysis: &str,
    normalize: bool,
) -> PyResult<MetricConfig> {
    let mut metric_set = MetricSet::empty();
    for name in metrics.iter() {
        let metric = Metric::from_name(name).ok_or_else(|| {
            PyValueError::new_err(format!("Unknown metric '{}'.", name))
        })?;
        metric_set.insert(metric);
    }
    let distance_mode = match analysis {
        "topological" => DistanceMode::Topological,
        "geodetic" => DistanceMode::Geodetic,
        _ => {
            return Err(PyValueError::new_err(format!(
                "Analysis must be 'topological' or 'geodetic', got '{}'.",
                analysis
            )))
        }
    };
    let normalization = if normalize {
        Normalization::PercentOfTotal
    } else {
        Normalization::None
    };
    Ok(MetricConfig::new(metric_set)
        .with_distance_mode(distance_mode)
        .with_radius(Radius::from_value(radius)?)
        .with_normalization(normalization))
}

/// Network of spatial features for configurational analysis.
#[pyclass(name = "NetworkStructure")]
pub struct PyNetworkStructure {
    inner: NetworkStructure,
}

#[pymethods]
impl PyNetworkStructure {
    #[new]
    pub fn new() -> Self {
        Self {
            inner: NetworkStructure::new(),
        }
    }

    #[pyo3(signature = (node_key, load=1.0, supply=1.0, demand=1.0, live=true))]
    pub fn add_node(
        &mut self,
        node_key: String,
        load: f64,
        supply: f64,
        demand: f64,
        live: bool,
    ) -> PyResult<usize> {
        let node_idx = self
            .inner
            .add_node(node_key, NodeAttributes::new(load, supply, demand));
        self.inner.set_node_live(node_idx, live)?;
        Ok(node_idx)
    }

    #[pyo3(signature = (start_nd_idx, end_nd_idx, length, imp_factor=None))]
    pub fn add_edge(
        &mut self,
        start_nd_idx: usize,
        end_nd_idx: usize,
        length: f64,
        imp_factor: Option<f64>,
    ) -> PyResult<usize> {
        Ok(self
            .inner
            .add_edge(start_nd_idx, end_nd_idx, length, imp_factor)?)
    }

    #[getter]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[getter]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    #[getter]
    pub fn node_keys(&self) -> Vec<String> {
        self.inner.node_keys()
    }

    pub fn progress(&self) -> usize {
        self.inner.progress()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn validate(&self) -> PyResult<bool> {
        self.inner.validate()?;
        Ok(true)
    }

    /// Returns a dict of metric name to per-node values.
    #[pyo3(signature = (metrics, radius=0.0, analysis="topological", normalize=false))]
    pub fn compute_metrics(
        &self,
        metrics: Vec<String>,
        radius: f64,
        analysis: &str,
        normalize: bool,
        py: Python,
    ) -> PyResult<HashMap<String, Py<PyArray1<f64>>>> {
        let config = build_config(metrics, radius, analysis, normalize)?;
        self.inner.reset_cancel();
        let result = py.allow_threads(|| self.inner.compute_metrics(&config))?;
        Ok(result
            .metrics()
            .iter()
            .filter_map(|metric| {
                result.values(metric).map(|vals| {
                    (
                        metric.name().to_string(),
                        vals.to_vec().into_pyarray(py).unbind(),
                    )
                })
            })
            .collect())
    }

    /// Returns a metrics x nodes array, rows in the order the metrics were requested.
    #[pyo3(signature = (metrics, radius=0.0, analysis="topological", normalize=false))]
    pub fn metric_matrix(
        &self,
        metrics: Vec<String>,
        radius: f64,
        analysis: &str,
        normalize: bool,
        py: Python,
    ) -> PyResult<Py<PyArray2<f64>>> {
        let order: Vec<Metric> = metrics
            .iter()
            .filter_map(|name| Metric::from_name(name))
            .collect();
        let config = build_config(metrics, radius, analysis, normalize)?;
        self.inner.reset_cancel();
        let result = py.allow_threads(|| self.inner.compute_metrics(&config))?;
        let node_count = result.node_count();
        let mut flat: Vec<f64> = Vec::with_capacity(order.len() * node_count);
        for metric in order.iter() {
            match result.values(*metric) {
                Some(vals) => flat.extend_from_slice(vals),
                None => flat.extend(std::iter::repeat(0.0).take(node_count)),
            }
        }
        let matrix = Array2::from_shape_vec((order.len(), node_count), flat)
            .map_err(|err| PyValueError::new_err(err.to_string()))?;
        Ok(matrix.into_pyarray(py).unbind())
    }
}

/// GAUS configurational metrics implemented in Rust.
#[pymodule]
fn gaus(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    py_module.add_class::<PyNetworkStructure>()?;
    py_module.add(
        "__doc__",
        "Configurational metrics for spatial networks implemented in Rust.",
    )?;
    Ok(())
}
