//! Supplier procurement KPIs and alerts.
//!
//! The simpler sibling of the last-mile pipeline: one purchase-order table
//! joined against a static SLA-by-category mapping, aggregated per supplier
//! and month, then run through a four-rule threshold table. Shares the
//! [`Severity`] scale and the null-skipping aggregation conventions.

use crate::pipeline::alerts::Severity;
use crate::pipeline::utility::{group_by_key, mean_present, round_to};
use crate::records::{de_opt_date, de_opt_f64};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One purchase-order row from `procurement_orders.csv` (original vendor
/// column headers).
#[derive(Debug, Clone, Deserialize)]
pub struct ProcurementOrder {
    #[serde(rename = "PO_ID")]
    pub po_id: String,
    #[serde(rename = "Supplier")]
    pub supplier: String,
    #[serde(rename = "Order_Date", deserialize_with = "de_opt_date")]
    pub order_date: Option<NaiveDate>,
    #[serde(rename = "Delivery_Date", deserialize_with = "de_opt_date")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(rename = "Item_Category")]
    pub item_category: String,
    #[serde(rename = "Order_Status")]
    pub order_status: String,
    #[serde(rename = "Quantity", deserialize_with = "de_opt_f64")]
    pub quantity: Option<f64>,
    #[serde(rename = "Unit_Price", deserialize_with = "de_opt_f64")]
    pub unit_price: Option<f64>,
    #[serde(rename = "Negotiated_Price", deserialize_with = "de_opt_f64")]
    pub negotiated_price: Option<f64>,
    #[serde(rename = "Defective_Units", deserialize_with = "de_opt_f64")]
    pub defective_units: Option<f64>,
    #[serde(rename = "Compliance")]
    pub compliance: String,
}

/// Delivery SLA in days per item category, with a default for unmapped
/// categories.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySlaTable {
    #[serde(default = "default_category_sla_days")]
    pub sla_days: BTreeMap<String, f64>,
    #[serde(default = "default_sla_days")]
    pub default_days: f64,
}

fn default_sla_days() -> f64 {
    10.0
}

fn default_category_sla_days() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("Raw Materials".to_string(), 14.0),
        ("Office Supplies".to_string(), 7.0),
        ("MRO".to_string(), 10.0),
        ("Packaging".to_string(), 9.0),
        ("IT Equipment".to_string(), 12.0),
    ])
}

impl Default for CategorySlaTable {
    fn default() -> Self {
        CategorySlaTable {
            sla_days: default_category_sla_days(),
            default_days: default_sla_days(),
        }
    }
}

impl CategorySlaTable {
    pub fn days_for(&self, category: &str) -> f64 {
        self.sla_days.get(category).copied().unwrap_or(self.default_days)
    }
}

/// Thresholds for the supplier alert rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcurementThresholds {
    pub on_time_rate_min: f64,
    pub defect_rate_max: f64,
    pub compliance_rate_min: f64,
    pub avg_savings_rate_min: f64,
}

impl Default for ProcurementThresholds {
    fn default() -> Self {
        ProcurementThresholds {
            on_time_rate_min: 0.95,
            defect_rate_max: 0.02,
            compliance_rate_min: 0.95,
            avg_savings_rate_min: 0.03,
        }
    }
}

/// Per-supplier-month KPIs; unrounded fractions.
#[derive(Debug, Clone)]
pub struct SupplierMonthKpi {
    pub supplier: String,
    pub month: Option<NaiveDate>,
    pub orders: u32,
    pub on_time_rate: Option<f64>,
    pub avg_lead_time_days: Option<f64>,
    pub delivery_completion_rate: f64,
    pub avg_savings_rate: Option<f64>,
    pub defect_rate: Option<f64>,
    pub compliance_rate: f64,
}

/// Presentation row for `supplier_monthly_kpis_pretty.csv`: percent columns
/// 0 to 100 at 1 decimal, lead time at 1 decimal.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierMonthKpiRow {
    pub supplier: String,
    pub month: Option<NaiveDate>,
    pub orders: u32,
    pub on_time_rate_pct: Option<f64>,
    pub delivery_completion_rate_pct: f64,
    pub avg_savings_rate_pct: Option<f64>,
    pub defect_rate_pct: Option<f64>,
    pub compliance_rate_pct: f64,
    pub avg_lead_time_days: Option<f64>,
}

impl SupplierMonthKpiRow {
    /// Output column order for `supplier_monthly_kpis_pretty.csv`.
    pub const HEADERS: &'static [&'static str] = &[
        "supplier",
        "month",
        "orders",
        "on_time_rate_pct",
        "delivery_completion_rate_pct",
        "avg_savings_rate_pct",
        "defect_rate_pct",
        "compliance_rate_pct",
        "avg_lead_time_days",
    ];
}

/// One supplier alert row for `alerts.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierAlert {
    pub supplier: String,
    pub month: Option<NaiveDate>,
    pub kpi: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

impl SupplierAlert {
    /// Output column order for the supplier alert table.
    pub const HEADERS: &'static [&'static str] =
        &["supplier", "month", "kpi", "value", "threshold", "severity"];
}

struct PreparedOrder<'a> {
    order: &'a ProcurementOrder,
    month: Option<NaiveDate>,
    lead_time_days: Option<f64>,
    on_time_flag: Option<f64>,
    savings_rate: Option<f64>,
}

fn prepare<'a>(order: &'a ProcurementOrder, sla: &CategorySlaTable) -> PreparedOrder<'a> {
    let lead_time_days = match (order.delivery_date, order.order_date) {
        (Some(delivery), Some(ordered)) => Some((delivery - ordered).num_days() as f64),
        _ => None,
    };
    let sla_days = sla.days_for(&order.item_category);
    // Undelivered orders are unknowable, not late.
    let on_time_flag = order.delivery_date.map(|_| {
        if lead_time_days.is_some_and(|lead| lead <= sla_days) {
            1.0
        } else {
            0.0
        }
    });
    let savings_rate = match (order.unit_price, order.negotiated_price) {
        (Some(unit), Some(negotiated)) if unit != 0.0 => Some((unit - negotiated) / unit),
        _ => None,
    };
    PreparedOrder {
        order,
        month: order.order_date.and_then(|d| d.with_day(1)),
        lead_time_days,
        on_time_flag,
        savings_rate,
    }
}

/// Aggregates purchase orders into per-(supplier, month) KPIs, in canonical
/// key order.
pub fn supplier_month_kpis(
    orders: &[ProcurementOrder],
    sla: &CategorySlaTable,
) -> Vec<SupplierMonthKpi> {
    let prepared: Vec<PreparedOrder<'_>> = orders.iter().map(|o| prepare(o, sla)).collect();
    let groups = group_by_key(prepared, |p| (p.order.supplier.clone(), p.month));

    groups
        .into_iter()
        .map(|((supplier, month), rows)| {
            let orders = rows.len() as u32;
            let delivered = rows
                .iter()
                .filter(|p| p.order.order_status == "Delivered")
                .count();
            let compliant = rows.iter().filter(|p| p.order.compliance == "Yes").count();

            // Defect rate is unit-weighted: total defective units over total
            // units, not a mean of per-row rates.
            let total_units: f64 = rows.iter().filter_map(|p| p.order.quantity).sum();
            let total_defective: f64 = rows.iter().filter_map(|p| p.order.defective_units).sum();
            let defect_rate = if total_units == 0.0 {
                None
            } else {
                Some(total_defective / total_units)
            };

            SupplierMonthKpi {
                supplier,
                month,
                orders,
                on_time_rate: mean_present(rows.iter().map(|p| p.on_time_flag)),
                avg_lead_time_days: mean_present(rows.iter().map(|p| p.lead_time_days)),
                delivery_completion_rate: delivered as f64 / orders.max(1) as f64,
                avg_savings_rate: mean_present(rows.iter().map(|p| p.savings_rate)),
                defect_rate,
                compliance_rate: compliant as f64 / orders.max(1) as f64,
            }
        })
        .collect()
}

impl SupplierMonthKpi {
    pub fn to_row(&self) -> SupplierMonthKpiRow {
        let pct = |v: f64| round_to(v * 100.0, 1);
        SupplierMonthKpiRow {
            supplier: self.supplier.clone(),
            month: self.month,
            orders: self.orders,
            on_time_rate_pct: self.on_time_rate.map(pct),
            delivery_completion_rate_pct: pct(self.delivery_completion_rate),
            avg_savings_rate_pct: self.avg_savings_rate.map(pct),
            defect_rate_pct: self.defect_rate.map(pct),
            compliance_rate_pct: pct(self.compliance_rate),
            avg_lead_time_days: self.avg_lead_time_days.map(|v| round_to(v, 1)),
        }
    }
}

/// Evaluates the four supplier rules per KPI row, in fixed order; a missing
/// KPI value never triggers its rule.
pub fn evaluate_supplier_kpis(
    kpis: &[SupplierMonthKpi],
    thresholds: &ProcurementThresholds,
) -> Vec<SupplierAlert> {
    let mut alerts = Vec::new();
    for kpi in kpis {
        let mut emit = |name: &str, value: f64, threshold: f64, severity: Severity| {
            alerts.push(SupplierAlert {
                supplier: kpi.supplier.clone(),
                month: kpi.month,
                kpi: name.to_string(),
                value,
                threshold,
                severity,
            });
        };

        if let Some(rate) = kpi.on_time_rate {
            if rate < thresholds.on_time_rate_min {
                emit("on_time_rate", rate, thresholds.on_time_rate_min, Severity::Warn);
            }
        }
        if let Some(rate) = kpi.defect_rate {
            if rate > thresholds.defect_rate_max {
                emit("defect_rate", rate, thresholds.defect_rate_max, Severity::Critical);
            }
        }
        if kpi.compliance_rate < thresholds.compliance_rate_min {
            emit(
                "compliance_rate",
                kpi.compliance_rate,
                thresholds.compliance_rate_min,
                Severity::Warn,
            );
        }
        if let Some(rate) = kpi.avg_savings_rate {
            if rate < thresholds.avg_savings_rate_min {
                emit("avg_savings_rate", rate, thresholds.avg_savings_rate_min, Severity::Info);
            }
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn po(po_id: &str, supplier: &str, delivery_day: Option<u32>) -> ProcurementOrder {
        ProcurementOrder {
            po_id: po_id.to_string(),
            supplier: supplier.to_string(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            delivery_date: delivery_day.and_then(|d| NaiveDate::from_ymd_opt(2024, 3, d)),
            item_category: "Office Supplies".to_string(), // 7-day SLA
            order_status: if delivery_day.is_some() {
                "Delivered".to_string()
            } else {
                "Pending".to_string()
            },
            quantity: Some(100.0),
            unit_price: Some(10.0),
            negotiated_price: Some(9.5),
            defective_units: Some(0.0),
            compliance: "Yes".to_string(),
        }
    }

    #[test]
    fn test_on_time_uses_category_sla() {
        let sla = CategorySlaTable::default();
        let kpis = supplier_month_kpis(
            &[po("P1", "Acme", Some(11)), po("P2", "Acme", Some(20))],
            &sla,
        );
        assert_eq!(kpis.len(), 1);
        // 6-day lead is within the 7-day SLA, 15-day is not.
        assert_eq!(kpis[0].on_time_rate, Some(0.5));
        assert_eq!(kpis[0].avg_lead_time_days, Some(10.5));
    }

    #[test]
    fn test_undelivered_order_excluded_from_on_time() {
        let sla = CategorySlaTable::default();
        let kpis = supplier_month_kpis(&[po("P1", "Acme", Some(11)), po("P2", "Acme", None)], &sla);
        assert_eq!(kpis[0].on_time_rate, Some(1.0));
        assert_eq!(kpis[0].delivery_completion_rate, 0.5);
    }

    #[test]
    fn test_defect_rate_is_unit_weighted() {
        let sla = CategorySlaTable::default();
        let mut big = po("P1", "Acme", Some(11));
        big.quantity = Some(900.0);
        big.defective_units = Some(90.0);
        let mut small = po("P2", "Acme", Some(11));
        small.quantity = Some(100.0);
        small.defective_units = Some(0.0);
        let kpis = supplier_month_kpis(&[big, small], &sla);
        assert_eq!(kpis[0].defect_rate, Some(0.09));
    }

    #[test]
    fn test_zero_quantity_defect_rate_is_none() {
        let sla = CategorySlaTable::default();
        let mut order = po("P1", "Acme", Some(11));
        order.quantity = Some(0.0);
        order.defective_units = Some(0.0);
        let kpis = supplier_month_kpis(&[order], &sla);
        assert_eq!(kpis[0].defect_rate, None);
    }

    #[test]
    fn test_groups_split_by_supplier_and_month() {
        let sla = CategorySlaTable::default();
        let mut april = po("P3", "Acme", Some(11));
        april.order_date = NaiveDate::from_ymd_opt(2024, 4, 2);
        april.delivery_date = NaiveDate::from_ymd_opt(2024, 4, 6);
        let kpis = supplier_month_kpis(
            &[po("P1", "Acme", Some(11)), april, po("P2", "Zeta", Some(11))],
            &sla,
        );
        let keys: Vec<(&str, Option<NaiveDate>)> = kpis
            .iter()
            .map(|k| (k.supplier.as_str(), k.month))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Acme", NaiveDate::from_ymd_opt(2024, 3, 1)),
                ("Acme", NaiveDate::from_ymd_opt(2024, 4, 1)),
                ("Zeta", NaiveDate::from_ymd_opt(2024, 3, 1)),
            ]
        );
    }

    #[test]
    fn test_alert_rules_fixed_order_and_null_skip() {
        let kpi = SupplierMonthKpi {
            supplier: "Acme".to_string(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1),
            orders: 10,
            on_time_rate: Some(0.5),
            avg_lead_time_days: Some(9.0),
            delivery_completion_rate: 1.0,
            avg_savings_rate: None, // must not trigger despite 0.03 floor
            defect_rate: Some(0.5),
            compliance_rate: 0.5,
        };
        let alerts = evaluate_supplier_kpis(&[kpi], &ProcurementThresholds::default());
        let kpis: Vec<&str> = alerts.iter().map(|a| a.kpi.as_str()).collect();
        assert_eq!(kpis, vec!["on_time_rate", "defect_rate", "compliance_rate"]);
        assert_eq!(alerts[1].severity, Severity::Critical);
        assert_eq!(alerts[1].value, 0.5);
        assert_eq!(alerts[1].threshold, 0.02);
    }

    #[test]
    fn test_pretty_row_rounding() {
        let kpi = SupplierMonthKpi {
            supplier: "Acme".to_string(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1),
            orders: 3,
            on_time_rate: Some(2.0 / 3.0),
            avg_lead_time_days: Some(9.333),
            delivery_completion_rate: 1.0,
            avg_savings_rate: Some(0.0512),
            defect_rate: Some(0.01234),
            compliance_rate: 1.0,
        };
        let row = kpi.to_row();
        assert_eq!(row.on_time_rate_pct, Some(66.7));
        assert_eq!(row.avg_savings_rate_pct, Some(5.1));
        assert_eq!(row.defect_rate_pct, Some(1.2));
        assert_eq!(row.avg_lead_time_days, Some(9.3));
    }
}
