use crate::config::DefaultsConfig;
use crate::types::{FilterConfig, GenderFilter, InstitutionFilter, Metric, MetricSelection, ParseSelectionError};
use serde::Deserialize;

/// Dashboard selections as they arrive from a query string or the command line.
/// Anything left out falls back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardParams {
    pub year: Option<i32>,
    pub theme: Option<String>,
    pub zone: Option<String>,
    pub locality: Option<String>,
    pub metric: Option<String>,
    pub gender: Option<String>,
    pub institution: Option<String>,
}

impl DashboardParams {
    pub fn resolve(
        &self,
        defaults: &DefaultsConfig,
    ) -> Result<(FilterConfig, MetricSelection), ParseSelectionError> {
        let metric = match self.metric.as_deref() {
            Some(key) => key.parse::<Metric>()?,
            None => defaults.metric,
        };
        let gender = self
            .gender
            .as_deref()
            .map(str::parse::<GenderFilter>)
            .transpose()?
            .unwrap_or_default();
        let institution = self
            .institution
            .as_deref()
            .map(str::parse::<InstitutionFilter>)
            .transpose()?
            .unwrap_or_default();

        let filter = FilterConfig::new(
            self.year.unwrap_or(defaults.year),
            self.theme.clone().unwrap_or_else(|| defaults.theme.clone()),
        )
        .with_zone(self.zone.as_deref())
        .with_locality_query(self.locality.clone().unwrap_or_default());

        Ok((
            filter,
            MetricSelection {
                metric,
                gender,
                institution,
            },
        ))
    }
}
