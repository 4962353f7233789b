use std::collections::BTreeMap;

/// Anything that can report counters under stable dotted keys
pub trait MetricsSource {
    fn apply_metrics(&self, metrics: &mut BTreeMap<String, u64>);

    fn metrics(&self) -> BTreeMap<String, u64> {
        let mut metrics = BTreeMap::new();
        self.apply_metrics(&mut metrics);
        metrics
    }
}

/// Merges the counters of several sources into one map
#[derive(Default)]
pub struct CompositeMetricsSource<'a> {
    sources: Vec<&'a dyn MetricsSource>,
}

impl<'a> CompositeMetricsSource<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &'a dyn MetricsSource) -> Self {
        self.sources.push(source);
        self
    }
}

impl MetricsSource for CompositeMetricsSource<'_> {
    fn apply_metrics(&self, metrics: &mut BTreeMap<String, u64>) {
        for source in &self.sources {
            source.apply_metrics(metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, u64);

    impl MetricsSource for Fixed {
        fn apply_metrics(&self, metrics: &mut BTreeMap<String, u64>) {
            metrics.insert(self.0.to_string(), self.1);
        }
    }

    #[test]
    fn test_composite_collects_every_source() {
        let a = Fixed("a.hitCount", 1);
        let b = Fixed("b.hitCount", 2);
        let composite = CompositeMetricsSource::new().with(&a).with(&b);

        let metrics = composite.metrics();
        assert_eq!(metrics.get("a.hitCount"), Some(&1));
        assert_eq!(metrics.get("b.hitCount"), Some(&2));
    }
}
