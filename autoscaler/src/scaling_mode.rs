//! Combines a `MetricProbe` with threshold vectors to yield a discrete
//! scaling direction.

use std::sync::Arc;

use crate::{error::RuntimeError, probe::MetricProbe, types::Direction};

pub struct ScalingMode {
    probe: Arc<dyn MetricProbe>,
    min_range: Vec<f64>,
    max_range: Vec<f64>,
}

impl ScalingMode {
    #[must_use]
    pub fn new(
        probe: Arc<dyn MetricProbe>,
        min_range: Vec<f64>,
        max_range: Vec<f64>,
    ) -> Self {
        Self {
            probe,
            min_range,
            max_range,
        }
    }

    /// `+1` (`Up`) if any dimension exceeds its upper threshold;
    /// `-1` (`Down`) only if every dimension is below its lower
    /// threshold; `0` (`Hold`) otherwise. Upscale is demand-sensitive
    /// (one hot dimension suffices); downscale requires unanimous slack
    /// to avoid premature contraction.
    pub async fn direction(
        &self,
        app_name: &str,
    ) -> Result<Direction, RuntimeError> {
        let values = self.probe.sample(app_name).await?;
        if values.len() != self.max_range.len() {
            return Err(RuntimeError::DimensionMismatch {
                expected: self.max_range.len(),
                got: values.len(),
            });
        }

        if values
            .iter()
            .zip(&self.max_range)
            .any(|(value, hi)| value > hi)
        {
            return Ok(Direction::Up);
        }
        if values
            .iter()
            .zip(&self.min_range)
            .all(|(value, lo)| value < lo)
        {
            return Ok(Direction::Down);
        }
        Ok(Direction::Hold)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct FixedProbe(Vec<f64>);

    #[async_trait]
    impl MetricProbe for FixedProbe {
        async fn sample(
            &self,
            _app_name: &str,
        ) -> Result<Vec<f64>, RuntimeError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn any_hot_dimension_triggers_up() {
        let mode = ScalingMode::new(
            Arc::new(FixedProbe(vec![30.0, 90.0])),
            vec![20.0, 20.0],
            vec![70.0, 70.0],
        );
        assert_eq!(mode.direction("app").await.unwrap(), Direction::Up);
    }

    #[tokio::test]
    async fn all_cold_dimensions_trigger_down() {
        let mode = ScalingMode::new(
            Arc::new(FixedProbe(vec![5.0, 10.0])),
            vec![20.0, 20.0],
            vec![70.0, 70.0],
        );
        assert_eq!(mode.direction("app").await.unwrap(), Direction::Down);
    }

    #[tokio::test]
    async fn one_warm_dimension_holds_even_if_another_is_cold() {
        let mode = ScalingMode::new(
            Arc::new(FixedProbe(vec![5.0, 50.0])),
            vec![20.0, 20.0],
            vec![70.0, 70.0],
        );
        assert_eq!(mode.direction("app").await.unwrap(), Direction::Hold);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let mode = ScalingMode::new(
            Arc::new(FixedProbe(vec![5.0])),
            vec![20.0, 20.0],
            vec![70.0, 70.0],
        );
        assert!(matches!(
            mode.direction("app").await,
            Err(RuntimeError::DimensionMismatch { .. })
        ));
    }
}
