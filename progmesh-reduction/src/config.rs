//! LOD build parameters

use progmesh_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How many vertices each LOD level removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexReductionQuota {
    /// Remove a fixed number of vertices per level
    Constant,
    /// Remove a fraction of the vertices still alive at each level
    Proportional,
}

impl VertexReductionQuota {
    /// Collapses requested for a level that starts with `live_vertices`
    pub fn collapses_for(self, live_vertices: usize, reduction_value: f32) -> usize {
        match self {
            VertexReductionQuota::Constant => reduction_value as usize,
            VertexReductionQuota::Proportional => (live_vertices as f32 * reduction_value) as usize,
        }
    }
}

/// What to do when no valid collapse remains before the last level is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AbandonPolicy {
    /// Bake the remaining levels as copies of the last achievable state
    #[default]
    DuplicateLastLevel,
    /// Stop the build with [`Error::ReductionExhausted`]
    Fail,
}

/// Parameters of one progressive LOD build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodConfig {
    /// Number of reduced levels to bake
    pub num_levels: usize,
    pub quota: VertexReductionQuota,
    /// Vertex count for [`VertexReductionQuota::Constant`], fraction in
    /// `[0, 1]` for [`VertexReductionQuota::Proportional`]
    pub reduction_value: f32,
    pub abandon_policy: AbandonPolicy,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            num_levels: 1,
            quota: VertexReductionQuota::Proportional,
            reduction_value: 0.5,
            abandon_policy: AbandonPolicy::DuplicateLastLevel,
        }
    }
}

impl LodConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(
        num_levels: usize,
        quota: VertexReductionQuota,
        reduction_value: f32,
    ) -> Self {
        Self {
            num_levels,
            quota,
            reduction_value,
            ..Self::default()
        }
    }

    pub fn with_abandon_policy(mut self, abandon_policy: AbandonPolicy) -> Self {
        self.abandon_policy = abandon_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_reduction(self.quota, self.reduction_value)
    }
}

pub(crate) fn validate_reduction(quota: VertexReductionQuota, reduction_value: f32) -> Result<()> {
    if !reduction_value.is_finite() || reduction_value < 0.0 {
        return Err(Error::InvalidData(format!(
            "Reduction value must be a non-negative number, got {}",
            reduction_value
        )));
    }
    if quota == VertexReductionQuota::Proportional && reduction_value > 1.0 {
        return Err(Error::InvalidData(
            "Proportional reduction value must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LodConfig::new();
        assert_eq!(config.num_levels, 1);
        assert_eq!(config.quota, VertexReductionQuota::Proportional);
        assert_eq!(config.abandon_policy, AbandonPolicy::DuplicateLastLevel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_params() {
        let config = LodConfig::with_params(4, VertexReductionQuota::Constant, 10.0)
            .with_abandon_policy(AbandonPolicy::Fail);
        assert_eq!(config.num_levels, 4);
        assert_eq!(config.reduction_value, 10.0);
        assert_eq!(config.abandon_policy, AbandonPolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quota_counts() {
        assert_eq!(VertexReductionQuota::Constant.collapses_for(100, 7.9), 7);
        assert_eq!(VertexReductionQuota::Proportional.collapses_for(100, 0.25), 25);
        assert_eq!(VertexReductionQuota::Proportional.collapses_for(3, 0.5), 1);
    }

    #[test]
    fn test_invalid_reduction_values() {
        let proportional = |v| LodConfig::with_params(1, VertexReductionQuota::Proportional, v);
        assert!(proportional(1.5).validate().is_err());
        assert!(proportional(-0.1).validate().is_err());
        assert!(proportional(f32::NAN).validate().is_err());
        assert!(LodConfig::with_params(1, VertexReductionQuota::Constant, 1.5)
            .validate()
            .is_ok());
    }
}
