use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One locality/year/theme observation.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub fid: i64,
    pub locality_name: String,
    pub zone_code: String,
    pub locality_id: i64,
    pub year: i32,
    pub annual_id: i64,
    pub theme: String,
    pub metrics: MetricValues,
    pub geometry: MultiPolygon<f64>,
    // Informational only, carried through from the source file.
    pub shape_area: f64,
    pub shape_length: f64,
}

/// Raw metric fields of a record. Missing or malformed values are stored as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricValues {
    pub enrollment_total: u64,
    pub enrollment_male: u64,
    pub enrollment_female: u64,
    pub institutions_total: u64,
    pub institutions_public: u64,
    pub institutions_private: u64,
    pub enrollment_preschool: u64,
    pub enrollment_primary: u64,
    pub enrollment_secondary: u64,
    pub enrollment_media: u64,
}

impl MetricValues {
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::EnrollmentTotal => self.enrollment_total,
            Metric::EnrollmentMale => self.enrollment_male,
            Metric::EnrollmentFemale => self.enrollment_female,
            Metric::InstitutionsTotal => self.institutions_total,
            Metric::InstitutionsPublic => self.institutions_public,
            Metric::InstitutionsPrivate => self.institutions_private,
            Metric::EnrollmentPreschool => self.enrollment_preschool,
            Metric::EnrollmentPrimary => self.enrollment_primary,
            Metric::EnrollmentSecondary => self.enrollment_secondary,
            Metric::EnrollmentMedia => self.enrollment_media,
        }
    }
}

/// The metrics a user can select for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Metric {
    EnrollmentTotal,
    EnrollmentMale,
    EnrollmentFemale,
    EnrollmentPreschool,
    EnrollmentPrimary,
    EnrollmentSecondary,
    EnrollmentMedia,
    InstitutionsTotal,
    InstitutionsPublic,
    InstitutionsPrivate,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::EnrollmentTotal,
        Metric::EnrollmentMale,
        Metric::EnrollmentFemale,
        Metric::EnrollmentPreschool,
        Metric::EnrollmentPrimary,
        Metric::EnrollmentSecondary,
        Metric::EnrollmentMedia,
        Metric::InstitutionsTotal,
        Metric::InstitutionsPublic,
        Metric::InstitutionsPrivate,
    ];

    /// Property name in the source GeoJSON.
    pub fn source_key(self) -> &'static str {
        match self {
            Metric::EnrollmentTotal => "Matrícula",
            Metric::EnrollmentMale => "M_hombres",
            Metric::EnrollmentFemale => "M_mujeres",
            Metric::EnrollmentPreschool => "M_Prees",
            Metric::EnrollmentPrimary => "M_Prim",
            Metric::EnrollmentSecondary => "M_Sec",
            Metric::EnrollmentMedia => "M_Media",
            Metric::InstitutionsTotal => "N_IE",
            Metric::InstitutionsPublic => "N_IE_O",
            Metric::InstitutionsPrivate => "N_IE_",
        }
    }

    pub fn snake_name(self) -> &'static str {
        match self {
            Metric::EnrollmentTotal => "enrollment_total",
            Metric::EnrollmentMale => "enrollment_male",
            Metric::EnrollmentFemale => "enrollment_female",
            Metric::EnrollmentPreschool => "enrollment_preschool",
            Metric::EnrollmentPrimary => "enrollment_primary",
            Metric::EnrollmentSecondary => "enrollment_secondary",
            Metric::EnrollmentMedia => "enrollment_media",
            Metric::InstitutionsTotal => "institutions_total",
            Metric::InstitutionsPublic => "institutions_public",
            Metric::InstitutionsPrivate => "institutions_private",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::EnrollmentTotal => "Matrícula Total",
            Metric::EnrollmentMale => "Matrícula Masculina",
            Metric::EnrollmentFemale => "Matrícula Femenina",
            Metric::EnrollmentPreschool => "Preescolar",
            Metric::EnrollmentPrimary => "Primaria",
            Metric::EnrollmentSecondary => "Secundaria",
            Metric::EnrollmentMedia => "Media",
            Metric::InstitutionsTotal => "Total Instituciones",
            Metric::InstitutionsPublic => "Instituciones Oficiales",
            Metric::InstitutionsPrivate => "Instituciones Privadas",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_key())
    }
}

impl FromStr for Metric {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.source_key() == s || m.snake_name() == s)
            .ok_or_else(|| ParseSelectionError::Metric(s.to_string()))
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.source_key().to_string()
    }
}

impl TryFrom<String> for Metric {
    type Error = ParseSelectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    #[default]
    Total,
    Male,
    Female,
}

impl FromStr for GenderFilter {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" | "" => Ok(GenderFilter::Total),
            "male" | "masculino" => Ok(GenderFilter::Male),
            "female" | "femenino" => Ok(GenderFilter::Female),
            other => Err(ParseSelectionError::Gender(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionFilter {
    #[default]
    Total,
    Public,
    Private,
}

impl FromStr for InstitutionFilter {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" | "" => Ok(InstitutionFilter::Total),
            "public" | "oficial" => Ok(InstitutionFilter::Public),
            "private" | "privada" => Ok(InstitutionFilter::Private),
            other => Err(ParseSelectionError::Institution(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSelectionError {
    #[error("unknown metric: {0:?}")]
    Metric(String),
    #[error("unknown gender filter: {0:?}")]
    Gender(String),
    #[error("unknown institution filter: {0:?}")]
    Institution(String),
}

/// Zone value the filter panel uses for "every zone".
pub const ALL_ZONES: &str = "__ALL__";

/// Which records are in view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub year: i32,
    pub theme: String,
    /// `None` keeps every zone.
    pub zone: Option<String>,
    /// Case-insensitive substring of the locality name; empty keeps all.
    pub locality_query: String,
}

impl FilterConfig {
    pub fn new(year: i32, theme: impl Into<String>) -> Self {
        Self {
            year,
            theme: theme.into(),
            zone: None,
            locality_query: String::new(),
        }
    }

    /// Empty and `__ALL__` zone values both clear the zone constraint.
    pub fn with_zone(mut self, zone: Option<&str>) -> Self {
        self.zone = zone
            .filter(|z| !z.is_empty() && *z != ALL_ZONES)
            .map(str::to_string);
        self
    }

    pub fn with_locality_query(mut self, query: impl Into<String>) -> Self {
        self.locality_query = query.into();
        self
    }
}

/// Which number is read from each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricSelection {
    pub metric: Metric,
    pub gender: GenderFilter,
    pub institution: InstitutionFilter,
}

impl MetricSelection {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            gender: GenderFilter::Total,
            institution: InstitutionFilter::Total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parses_source_key_and_snake_name() {
        assert_eq!("Matrícula".parse::<Metric>(), Ok(Metric::EnrollmentTotal));
        assert_eq!("N_IE_".parse::<Metric>(), Ok(Metric::InstitutionsPrivate));
        assert_eq!(
            "institutions_public".parse::<Metric>(),
            Ok(Metric::InstitutionsPublic)
        );
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        assert_eq!(
            "Shape__Area".parse::<Metric>(),
            Err(ParseSelectionError::Metric("Shape__Area".to_string()))
        );
    }

    #[test]
    fn test_metric_keys_are_unique() {
        for (i, a) in Metric::ALL.iter().enumerate() {
            for b in &Metric::ALL[i + 1..] {
                assert_ne!(a.source_key(), b.source_key());
                assert_ne!(a.snake_name(), b.snake_name());
            }
        }
    }

    #[test]
    fn test_filter_aliases() {
        assert_eq!("masculino".parse::<GenderFilter>(), Ok(GenderFilter::Male));
        assert_eq!("female".parse::<GenderFilter>(), Ok(GenderFilter::Female));
        assert_eq!(
            "oficial".parse::<InstitutionFilter>(),
            Ok(InstitutionFilter::Public)
        );
        assert!("both".parse::<InstitutionFilter>().is_err());
    }

    #[test]
    fn test_all_zones_sentinel_clears_zone() {
        let filter = FilterConfig::new(2021, "Educación").with_zone(Some(ALL_ZONES));
        assert_eq!(filter.zone, None);
        let filter = FilterConfig::new(2021, "Educación").with_zone(Some(""));
        assert_eq!(filter.zone, None);
        let filter = FilterConfig::new(2021, "Educación").with_zone(Some("L1"));
        assert_eq!(filter.zone.as_deref(), Some("L1"));
    }
}
