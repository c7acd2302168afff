use crate::error::{Error, Result};
use crate::model::PointCloud;

/// Attribute-driven predicate over edge (or point) indices. Implementations
/// are opaque to the refinement engine.
pub trait EdgeFilter: Send + Sync {
    fn test(&self, index: usize) -> bool;
}

impl<F> EdgeFilter for F
where
    F: Fn(usize) -> bool + Send + Sync,
{
    fn test(&self, index: usize) -> bool {
        self(index)
    }
}

/// All-must-pass chain with early exit. An empty chain passes everything.
pub struct FilterChain {
    filters: Vec<Box<dyn EdgeFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain { filters: Vec::new() }
    }

    pub fn with(mut self, filter: impl EdgeFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Marks indices whose `name` column value is at or above `threshold`.
    /// Fails when the column is absent from the dataset.
    pub fn with_attribute_above(
        self,
        cloud: &PointCloud,
        name: &str,
        threshold: f64,
    ) -> Result<Self> {
        let column = cloud
            .attribute(name)
            .ok_or_else(|| Error::FilterBuild(format!("missing attribute column '{name}'")))?
            .to_vec();
        Ok(self.with(move |i: usize| column.get(i).is_some_and(|&v| v >= threshold)))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn test(&self, index: usize) -> bool {
        self.filters.iter().all(|f| f.test(index))
    }

    /// Independent per-filter results, for callers that need them all.
    pub fn test_each(&self, index: usize) -> Vec<bool> {
        self.filters.iter().map(|f| f.test(index)).collect()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}
