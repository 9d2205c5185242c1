use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::{AppContext, DashboardConfig};
use crate::error::DashboardError;
use crate::models::{
    ArpuPoint, FeatureImportance, KpiRow, RetentionPoint, SegmentRow, SignificanceRow,
};
use crate::table::Table;

/// The six exports the upstream notebook writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    RevenueKpis,
    PremiumRetentionMonthly,
    ArpuMonthly,
    PrefGroupSummary,
    PrefSignificanceTests,
    FeatureImportanceLtv,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::RevenueKpis,
        Dataset::PremiumRetentionMonthly,
        Dataset::ArpuMonthly,
        Dataset::PrefGroupSummary,
        Dataset::PrefSignificanceTests,
        Dataset::FeatureImportanceLtv,
    ];

    pub fn logical_name(self) -> &'static str {
        match self {
            Dataset::RevenueKpis => "revenue_kpis",
            Dataset::PremiumRetentionMonthly => "premium_retention_monthly",
            Dataset::ArpuMonthly => "arpu_monthly",
            Dataset::PrefGroupSummary => "pref_group_summary",
            Dataset::PrefSignificanceTests => "pref_significance_tests",
            Dataset::FeatureImportanceLtv => "feature_importance_ltv",
        }
    }

    pub fn file_name(self, config: &DashboardConfig) -> String {
        format!(
            "{}{}.{}",
            config.file_prefix,
            self.logical_name(),
            config.file_extension
        )
    }
}

/// First existing candidate across the configured search directories.
pub fn resolve(dataset: Dataset, config: &DashboardConfig) -> Option<PathBuf> {
    let file_name = dataset.file_name(config);
    config.search_dirs.iter().find_map(|dir| {
        let candidate = dir.join(&file_name);
        debug!("checking {}", candidate.display());
        candidate.is_file().then_some(candidate)
    })
}

/// Read-through cache of parsed tables keyed by resolved path.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<PathBuf, Rc<Table>>,
}

impl TableCache {
    pub fn get_or_load(&mut self, name: &str, path: &Path) -> Result<Rc<Table>, DashboardError> {
        if let Some(table) = self.tables.get(path) {
            debug!("cache hit for {}", path.display());
            return Ok(Rc::clone(table));
        }
        let table = Rc::new(Table::from_path(name, path)?);
        info!("loaded {} ({} rows) from {}", name, table.len(), path.display());
        self.tables.insert(path.to_path_buf(), Rc::clone(&table));
        Ok(table)
    }
}

/// `Ok(None)` when the dataset is absent from every search directory.
pub fn load_table(ctx: &mut AppContext, dataset: Dataset) -> Result<Option<Rc<Table>>, DashboardError> {
    match resolve(dataset, &ctx.config) {
        Some(path) => ctx
            .cache
            .get_or_load(dataset.logical_name(), &path)
            .map(Some),
        None => {
            warn!("{} not found", dataset.file_name(&ctx.config));
            Ok(None)
        }
    }
}

/// Datasets from [`Dataset::ALL`] that cannot be resolved, in declaration order.
pub fn missing_datasets(config: &DashboardConfig) -> Vec<Dataset> {
    Dataset::ALL
        .into_iter()
        .filter(|dataset| resolve(*dataset, config).is_none())
        .collect()
}

/// Typed inputs for one render. A `None` field is listed in `missing`; a
/// dataset whose table lacks a named column is listed in `malformed` and its
/// field holds no rows.
#[derive(Debug, Default)]
pub struct Inputs {
    pub kpis: Option<Vec<KpiRow>>,
    pub retention: Option<Vec<RetentionPoint>>,
    pub arpu: Option<Vec<ArpuPoint>>,
    pub segments: Option<Vec<SegmentRow>>,
    pub significance: Option<Vec<SignificanceRow>>,
    pub importance: Option<Vec<FeatureImportance>>,
    pub missing: Vec<Dataset>,
    pub malformed: Vec<Dataset>,
}

impl Inputs {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty()
    }

    fn assign(&mut self, dataset: Dataset, table: &Table) -> Result<(), DashboardError> {
        match dataset {
            Dataset::RevenueKpis => self.kpis = Some(KpiRow::from_table(table)?),
            Dataset::PremiumRetentionMonthly => {
                self.retention = Some(RetentionPoint::from_table(table)?)
            }
            Dataset::ArpuMonthly => self.arpu = Some(ArpuPoint::from_table(table)?),
            Dataset::PrefGroupSummary => self.segments = Some(SegmentRow::from_table(table)?),
            Dataset::PrefSignificanceTests => {
                self.significance = Some(SignificanceRow::from_table(table)?)
            }
            Dataset::FeatureImportanceLtv => {
                self.importance = Some(FeatureImportance::from_table(table))
            }
        }
        Ok(())
    }

    /// Keeps the panel with no rows. The KPI cards have no empty form, so a
    /// malformed KPI table leaves them out.
    fn mark_malformed(&mut self, dataset: Dataset) {
        match dataset {
            Dataset::RevenueKpis => self.kpis = None,
            Dataset::PremiumRetentionMonthly => self.retention = Some(Vec::new()),
            Dataset::ArpuMonthly => self.arpu = Some(Vec::new()),
            Dataset::PrefGroupSummary => self.segments = Some(Vec::new()),
            Dataset::PrefSignificanceTests => self.significance = Some(Vec::new()),
            Dataset::FeatureImportanceLtv => self.importance = Some(Vec::new()),
        }
        self.malformed.push(dataset);
    }
}

pub fn load_inputs(ctx: &mut AppContext) -> Result<Inputs, DashboardError> {
    let mut inputs = Inputs::default();

    for dataset in Dataset::ALL {
        let Some(table) = load_table(ctx, dataset)? else {
            inputs.missing.push(dataset);
            continue;
        };
        match inputs.assign(dataset, &table) {
            Ok(()) => {}
            Err(err @ DashboardError::MissingColumn { .. }) => {
                warn!("{}: {err}", dataset.file_name(&ctx.config));
                inputs.mark_malformed(dataset);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(inputs)
}
