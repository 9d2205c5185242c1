use serde::Serialize;

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::kpi::{self, KpiSnapshot};
use crate::loader::{Dataset, Inputs};
use crate::models::{ArpuPoint, FeatureImportance, RetentionPoint, SignificanceRow};
use crate::narrative::Narrative;
use crate::ranking::{top_n_by, SortOrder};
use crate::segments::{self, SegmentSummary};
use crate::series::{self, CohortCell, CumulativePoint, Peak, RetentionArpuPair};

#[derive(Debug, Clone, Serialize)]
pub struct RetentionPanel {
    pub points: Vec<RetentionPoint>,
    pub peak: Option<Peak>,
    pub cohort: Vec<CohortCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArpuPanel {
    pub points: Vec<ArpuPoint>,
    pub peak: Option<Peak>,
    pub cumulative: Vec<CumulativePoint>,
}

/// View model for one render. A `None` panel lacks an input file; an empty
/// list means the input was present but nothing qualified, or its columns
/// did not match (then it is also named in `malformed`).
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub missing: Vec<String>,
    pub malformed: Vec<String>,
    pub currency_label: String,
    pub significance_level: f64,
    pub top_n: usize,
    pub kpis: Option<KpiSnapshot>,
    pub retention: Option<RetentionPanel>,
    pub arpu: Option<ArpuPanel>,
    pub retention_vs_arpu: Vec<RetentionArpuPair>,
    pub segments: Option<Vec<SegmentSummary>>,
    pub significant: Option<Vec<SignificanceRow>>,
    pub importance: Option<Vec<FeatureImportance>>,
    pub narrative: Option<Narrative>,
}

impl Dashboard {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty()
    }
}

/// Rows with `p_value` strictly below `level`, smallest first.
pub fn significant_features(
    rows: &[SignificanceRow],
    level: f64,
    top_n: usize,
) -> Vec<SignificanceRow> {
    let significant: Vec<SignificanceRow> = rows
        .iter()
        .filter(|row| row.p_value.is_some_and(|p| p < level))
        .cloned()
        .collect();
    top_n_by(significant, SortOrder::Ascending, top_n, |row| {
        row.p_value.unwrap_or(f64::NAN)
    })
}

pub fn top_features(rows: &[FeatureImportance], top_n: usize) -> Vec<FeatureImportance> {
    top_n_by(rows.to_vec(), SortOrder::Descending, top_n, |row| {
        row.importance
    })
}

pub fn build(inputs: &Inputs, config: &DashboardConfig) -> Result<Dashboard, DashboardError> {
    let kpis = inputs
        .kpis
        .as_deref()
        .map(kpi::extract_kpis)
        .transpose()?;

    let retention = inputs.retention.as_ref().map(|points| RetentionPanel {
        peak: series::retention_peak(points),
        cohort: series::cohort_grid(points),
        points: points.clone(),
    });

    let arpu = inputs.arpu.as_ref().map(|points| ArpuPanel {
        peak: series::arpu_peak(points),
        cumulative: series::cumulative_arpu(points),
        points: points.clone(),
    });

    let retention_vs_arpu = match (&inputs.retention, &inputs.arpu) {
        (Some(retention), Some(arpu)) => series::retention_vs_arpu(retention, arpu),
        _ => Vec::new(),
    };

    let segments = inputs
        .segments
        .as_deref()
        .map(|rows| segments::top_segments(rows, config.top_n));

    let significant = inputs.significance.as_deref().map(|rows| {
        significant_features(rows, config.significance_level, config.top_n)
    });

    let importance = inputs
        .importance
        .as_deref()
        .map(|rows| top_features(rows, config.top_n));

    let narrative = if inputs.is_complete() {
        kpis.as_ref().map(|kpis| {
            Narrative::compose(
                kpis,
                retention.as_ref().and_then(|p| p.peak.as_ref()),
                arpu.as_ref().and_then(|p| p.peak.as_ref()),
                segments.as_ref().and_then(|s| s.first()),
                importance.as_ref().and_then(|i| i.first()),
                &config.currency_label,
            )
        })
    } else {
        None
    };

    let file_names = |datasets: &[Dataset]| -> Vec<String> {
        datasets
            .iter()
            .map(|dataset| dataset.file_name(config))
            .collect()
    };

    Ok(Dashboard {
        missing: file_names(&inputs.missing),
        malformed: file_names(&inputs.malformed),
        currency_label: config.currency_label.clone(),
        significance_level: config.significance_level,
        top_n: config.top_n,
        kpis,
        retention,
        arpu,
        retention_vs_arpu,
        segments,
        significant,
        importance,
        narrative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppContext;
    use crate::loader::tests::{config_for, write_all};
    use crate::loader::{self, Dataset};

    fn sig(feature: &str, p: Option<f64>) -> SignificanceRow {
        SignificanceRow {
            feature: feature.to_string(),
            test_type: "chi2".to_string(),
            p_value: p,
        }
    }

    #[test]
    fn significance_filter_is_strict_and_ascending() {
        let rows = vec![
            sig("age", Some(0.2)),
            sig("device", Some(0.03)),
            sig("edge", Some(0.05)),
            sig("genre", Some(0.0004)),
            sig("blank", None),
        ];
        let view = significant_features(&rows, 0.05, 10);
        let names: Vec<_> = view.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(names, vec!["genre", "device"]);
    }

    #[test]
    fn no_significant_rows_is_an_empty_panel() {
        let rows = vec![sig("age", Some(0.2))];
        assert!(significant_features(&rows, 0.05, 10).is_empty());
    }

    #[test]
    fn top_feature_after_normalizing_arbitrary_headers() {
        let table = crate::table::Table::from_csv_str(
            "feature_importance_ltv",
            "col_a,col_b\nage,0.22\ndevice,0.31\n",
        )
        .unwrap();
        let rows = FeatureImportance::from_table(&table);
        let top = top_features(&rows, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].feature, "device");
        assert_eq!(crate::format::importance(top[0].importance), "0.310");
    }

    #[test]
    fn complete_inputs_build_every_panel() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_all(dir.path(), &config, &[]);
        let mut ctx = AppContext::new(config);
        let inputs = loader::load_inputs(&mut ctx).unwrap();

        let dashboard = build(&inputs, &ctx.config).unwrap();
        assert!(dashboard.is_complete());
        assert_eq!(dashboard.kpis.unwrap().conversion_rate, 0.15);
        assert_eq!(
            dashboard.retention.as_ref().unwrap().peak.as_ref().unwrap().label,
            "2023-01→2023-02"
        );
        assert_eq!(dashboard.arpu.as_ref().unwrap().peak.as_ref().unwrap().label, "2023-02");
        assert_eq!(dashboard.retention_vs_arpu.len(), 2);
        let segments = dashboard.segments.as_ref().unwrap();
        assert_eq!(segments[0].label(), "genre = Rock");
        assert_eq!(segments[1].label(), "genre = Pop");
        assert_eq!(segments[2].label(), "device = Smartphone");
        assert_eq!(dashboard.significant.as_ref().unwrap().len(), 2);
        assert_eq!(dashboard.importance.as_ref().unwrap()[0].feature, "device");
        assert!(dashboard.narrative.is_some());
    }

    #[test]
    fn missing_inputs_drop_only_their_panels_and_the_narrative() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_all(dir.path(), &config, &[Dataset::PrefSignificanceTests]);
        let mut ctx = AppContext::new(config);
        let inputs = loader::load_inputs(&mut ctx).unwrap();

        let dashboard = build(&inputs, &ctx.config).unwrap();
        assert_eq!(dashboard.missing, vec!["out_pref_significance_tests.csv"]);
        assert!(dashboard.significant.is_none());
        assert!(dashboard.segments.is_some());
        assert!(dashboard.narrative.is_none());
    }

    #[test]
    fn malformed_table_keeps_other_panels() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_all(dir.path(), &config, &[Dataset::PrefSignificanceTests]);
        std::fs::write(
            dir.path().join(Dataset::PrefSignificanceTests.file_name(&config)),
            "feature,test_type,pvalue\ngenre,chi2,0.0004\n",
        )
        .unwrap();
        let mut ctx = AppContext::new(config);
        let inputs = loader::load_inputs(&mut ctx).unwrap();

        let dashboard = build(&inputs, &ctx.config).unwrap();
        assert!(dashboard.missing.is_empty());
        assert_eq!(dashboard.malformed, vec!["out_pref_significance_tests.csv"]);
        assert!(!dashboard.is_complete());
        assert!(dashboard.significant.as_ref().is_some_and(Vec::is_empty));
        assert_eq!(dashboard.kpis.unwrap().conversion_rate, 0.15);
        assert_eq!(dashboard.segments.as_ref().map(Vec::len), Some(3));
        assert!(dashboard.narrative.is_none());
    }

    #[test]
    fn ambiguous_kpi_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_all(dir.path(), &config, &[Dataset::RevenueKpis]);
        std::fs::write(
            dir.path().join(Dataset::RevenueKpis.file_name(&config)),
            "metric,value\nconversion_rate,0.1\nconversion_rate,0.2\n",
        )
        .unwrap();
        let mut ctx = AppContext::new(config);
        let inputs = loader::load_inputs(&mut ctx).unwrap();

        assert!(matches!(
            build(&inputs, &ctx.config),
            Err(DashboardError::MetricAmbiguous { .. })
        ));
    }
}
