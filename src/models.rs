use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;

use crate::error::DashboardError;
use crate::table::{parse_number, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub metric: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionPoint {
    pub from_to: String,
    pub premium_retention: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArpuPoint {
    pub month: String,
    pub arpu: Option<f64>,
}

/// One row of the preference-group summary. The category columns differ per
/// attribute, so every cell is kept by column name next to the fixed measures.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub variable: String,
    pub cells: BTreeMap<String, String>,
    pub users: Option<f64>,
    pub avg_ltv: Option<f64>,
    pub avg_premium_duration: Option<f64>,
    pub avg_monthly_revenue: Option<f64>,
    pub free_to_premium_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignificanceRow {
    pub feature: String,
    pub test_type: String,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

impl KpiRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, DashboardError> {
        let metric = table.require_column("metric")?;
        let value = table.require_column("value")?;
        Ok(table
            .rows
            .iter()
            .map(|row| KpiRow {
                metric: row[metric].clone(),
                value: parse_number(&row[value]),
            })
            .collect())
    }
}

impl RetentionPoint {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, DashboardError> {
        let from_to = table.require_column("from_to")?;
        let retention = table.require_column("premium_retention")?;
        Ok(table
            .rows
            .iter()
            .map(|row| RetentionPoint {
                from_to: row[from_to].clone(),
                premium_retention: parse_number(&row[retention]),
            })
            .collect())
    }
}

impl ArpuPoint {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, DashboardError> {
        let month = table.require_column("month")?;
        let arpu = table.require_column("arpu")?;
        Ok(table
            .rows
            .iter()
            .map(|row| ArpuPoint {
                month: row[month].clone(),
                arpu: parse_number(&row[arpu]),
            })
            .collect())
    }
}

impl SegmentRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, DashboardError> {
        let variable = table.require_column("variable")?;
        let avg_ltv = table.require_column("avg_ltv")?;
        let users = table.column_index("users");
        let duration = table.column_index("avg_premium_duration");
        let monthly = table.column_index("avg_monthly_revenue");
        let conversion = table.column_index("free_to_premium_rate");

        let measure = |row: &[String], idx: Option<usize>| idx.and_then(|i| parse_number(&row[i]));

        Ok(table
            .rows
            .iter()
            .map(|row| SegmentRow {
                variable: row[variable].clone(),
                cells: table
                    .headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect(),
                users: measure(row, users),
                avg_ltv: parse_number(&row[avg_ltv]),
                avg_premium_duration: measure(row, duration),
                avg_monthly_revenue: measure(row, monthly),
                free_to_premium_rate: measure(row, conversion),
            })
            .collect())
    }
}

impl SignificanceRow {
    pub fn from_table(table: &Table) -> Result<Vec<Self>, DashboardError> {
        let feature = table.require_column("feature")?;
        let p_value = table.require_column("p_value")?;
        let test_type = table.column_index("test_type");
        Ok(table
            .rows
            .iter()
            .map(|row| SignificanceRow {
                feature: row[feature].clone(),
                test_type: test_type.map(|i| row[i].clone()).unwrap_or_default(),
                p_value: parse_number(&row[p_value]),
            })
            .collect())
    }
}

impl FeatureImportance {
    /// Importance exports arrive with arbitrary headers (sometimes an index
    /// column name, sometimes none), so the first two columns are taken
    /// positionally as feature and importance. Rows without a numeric
    /// importance are dropped; a table narrower than two columns yields no rows.
    pub fn from_table(table: &Table) -> Vec<Self> {
        if table.headers.len() < 2 {
            warn!(
                "{} has {} column(s), expected feature and importance",
                table.name,
                table.headers.len()
            );
            return Vec::new();
        }
        table
            .rows
            .iter()
            .filter_map(|row| {
                let feature = row[0].clone();
                let importance = parse_number(&row[1])?;
                (!feature.is_empty()).then_some(FeatureImportance {
                    feature,
                    importance,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, raw: &str) -> Table {
        Table::from_csv_str(name, raw).unwrap()
    }

    #[test]
    fn kpi_rows_keep_unparseable_values_as_missing() {
        let rows = KpiRow::from_table(&table(
            "revenue_kpis",
            "metric,value\nconversion_rate,0.15\narpu_overall,oops\n",
        ))
        .unwrap();
        assert_eq!(rows[0].value, Some(0.15));
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn segment_rows_keep_category_cells_by_name() {
        let rows = SegmentRow::from_table(&table(
            "pref_group_summary",
            "variable,genre,device,users,avg_ltv\ngenre,Pop,,120,50000\n",
        ))
        .unwrap();
        assert_eq!(rows[0].variable, "genre");
        assert_eq!(rows[0].cells.get("genre").map(String::as_str), Some("Pop"));
        assert_eq!(rows[0].avg_ltv, Some(50000.0));
        assert_eq!(rows[0].avg_premium_duration, None);
    }

    #[test]
    fn importance_columns_are_taken_by_position() {
        let rows = FeatureImportance::from_table(&table(
            "feature_importance_ltv",
            "Unnamed: 0,0\ndevice,0.31\nage,0.22\nbroken,\n",
        ));
        assert_eq!(
            rows,
            vec![
                FeatureImportance {
                    feature: "device".to_string(),
                    importance: 0.31
                },
                FeatureImportance {
                    feature: "age".to_string(),
                    importance: 0.22
                },
            ]
        );
    }

    #[test]
    fn single_column_importance_table_yields_no_rows() {
        let rows = FeatureImportance::from_table(&table("feature_importance_ltv", "feature\nage\n"));
        assert!(rows.is_empty());
    }

    #[test]
    fn significance_test_type_is_optional() {
        let rows = SignificanceRow::from_table(&table(
            "pref_significance_tests",
            "feature,p_value\ngenre,0.001\n",
        ))
        .unwrap();
        assert_eq!(rows[0].test_type, "");
        assert_eq!(rows[0].p_value, Some(0.001));
    }
}
