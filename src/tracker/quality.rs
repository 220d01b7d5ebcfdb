//! Quality KPIs computed from hourly inspection rows.

use serde::Serialize;

use super::models::{HOURS_PER_SHIFT, HourlyInspection, SelectedDefect, hour_label};

/// Placeholder shown on the summary board when no defects were recorded.
pub const EMPTY_DEFECT_SLOT: &str = "—";

/// Whole percent `num / den × 100`, rounded half up. Zero when `den` is zero.
pub fn percent_rounded(num: i64, den: i64) -> i64 {
    if den == 0 {
        return 0;
    }
    (num as f64 * 100.0 / den as f64 + 0.5).floor() as i64
}

/// Two-decimal percent label such as `"12.50%"`; `"0%"` when `den` is zero.
pub fn percent_label(num: i64, den: i64) -> String {
    if den == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", num as f64 * 100.0 / den as f64)
}

/// Sum of counts that saturates instead of overflowing.
fn saturating_total(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

/// Defective rate: defective pieces per hundred inspected.
pub fn defective_rate(row: &HourlyInspection) -> String {
    percent_label(row.counts.defective_pcs, row.counts.inspected_qty)
}

/// DHU%: defects per hundred inspected units.
pub fn dhu(row: &HourlyInspection) -> String {
    percent_label(row.counts.total_defects, row.counts.inspected_qty)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityTotals {
    pub inspected_qty: i64,
    pub passed_qty: i64,
    pub defective_pcs: i64,
    pub total_defects: i64,
    pub after_repair: i64,
}

impl QualityTotals {
    pub fn from_rows(rows: &[HourlyInspection]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, r| {
            let c = &r.counts;
            acc.inspected_qty = acc.inspected_qty.saturating_add(c.inspected_qty);
            acc.passed_qty = acc.passed_qty.saturating_add(c.passed_qty);
            acc.defective_pcs = acc.defective_pcs.saturating_add(c.defective_pcs);
            acc.total_defects = acc.total_defects.saturating_add(c.total_defects);
            acc.after_repair = acc.after_repair.saturating_add(c.after_repair);
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectTally {
    pub name: String,
    pub quantity: i64,
}

fn defect_name(defect: &SelectedDefect) -> &str {
    match defect.name.trim() {
        "" => "Unknown",
        name => name,
    }
}

/// Defect quantities summed across rows, in first-seen order.
pub fn tally_defects(rows: &[HourlyInspection]) -> Vec<DefectTally> {
    let mut tallies: Vec<DefectTally> = Vec::new();
    for defect in rows.iter().flat_map(|r| r.counts.selected_defects.iter()) {
        let name = defect_name(defect);
        match tallies.iter_mut().find(|t| t.name == name) {
            Some(tally) => tally.quantity = tally.quantity.saturating_add(defect.quantity),
            None => tallies.push(DefectTally {
                name: name.to_string(),
                quantity: defect.quantity,
            }),
        }
    }
    tallies
}

/// The `limit` most frequent defects. Ties keep first-seen order.
pub fn top_defects(rows: &[HourlyInspection], limit: usize) -> Vec<DefectTally> {
    let mut tallies = tally_defects(rows);
    tallies.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    tallies.truncate(limit);
    tallies
}

// ── Summary board ─────────────────────────────────────────────────────

/// The media + KPI board shown on the line screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub image_src: String,
    pub video_src: String,
    pub defects: Vec<String>,
    pub passing_rate_pct: i64,
    pub reject_pct: i64,
    #[serde(rename = "overallDHUPct")]
    pub overall_dhu_pct: i64,
    pub totals: QualityTotals,
}

pub fn summarize(
    rows: &[HourlyInspection],
    image_src: String,
    video_src: String,
    top_n: usize,
) -> QualitySummary {
    let totals = QualityTotals::from_rows(rows);
    let mut defects: Vec<String> = top_defects(rows, top_n)
        .into_iter()
        .map(|t| format!("{} ({})", t.name, t.quantity))
        .collect();
    if defects.is_empty() {
        defects = vec![EMPTY_DEFECT_SLOT.to_string(); top_n];
    }

    QualitySummary {
        image_src,
        video_src,
        defects,
        passing_rate_pct: percent_rounded(totals.passed_qty, totals.inspected_qty),
        reject_pct: percent_rounded(totals.defective_pcs, totals.inspected_qty),
        overall_dhu_pct: percent_rounded(totals.total_defects, totals.inspected_qty),
        totals,
    }
}

// ── Hourly dashboard ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectRow {
    pub name: String,
    /// One quantity per hour column.
    pub quantities: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourColumn {
    pub hour: i64,
    pub label: String,
    pub total_defects: i64,
    pub inspected_qty: i64,
    pub passed_qty: i64,
    pub after_repair: i64,
    pub defective_pcs: i64,
    pub defective_rate: String,
    pub dhu: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDefect {
    pub rank: usize,
    pub name: String,
    pub quantity: i64,
    /// Share of all inspected units, two decimals.
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyDashboard {
    pub columns: Vec<HourColumn>,
    pub defect_rows: Vec<DefectRow>,
    pub top_three: Vec<TopDefect>,
}

fn empty_column(hour: i64) -> HourColumn {
    HourColumn {
        hour,
        label: hour_label(hour),
        total_defects: 0,
        inspected_qty: 0,
        passed_qty: 0,
        after_repair: 0,
        defective_pcs: 0,
        defective_rate: "0%".to_string(),
        dhu: "0%".to_string(),
    }
}

/// Lay out one user's inspection rows as the twelve-hour dashboard table.
pub fn hourly_dashboard(rows: &[HourlyInspection]) -> HourlyDashboard {
    let slot = |hour: i64| rows.iter().find(|r| r.hour == hour);

    let columns = (1..=HOURS_PER_SHIFT)
        .map(|hour| match slot(hour) {
            Some(r) => HourColumn {
                hour,
                label: hour_label(hour),
                total_defects: r.counts.total_defects,
                inspected_qty: r.counts.inspected_qty,
                passed_qty: r.counts.passed_qty,
                after_repair: r.counts.after_repair,
                defective_pcs: r.counts.defective_pcs,
                defective_rate: defective_rate(r),
                dhu: dhu(r),
            },
            None => empty_column(hour),
        })
        .collect();

    let defect_rows = tally_defects(rows)
        .into_iter()
        .map(|t| DefectRow {
            quantities: (1..=HOURS_PER_SHIFT)
                .map(|hour| {
                    slot(hour).map_or(0, |r| {
                        saturating_total(
                            r.counts
                                .selected_defects
                                .iter()
                                .filter(|d| defect_name(d) == t.name)
                                .map(|d| d.quantity),
                        )
                    })
                })
                .collect(),
            name: t.name,
        })
        .collect();

    let inspected = saturating_total(rows.iter().map(|r| r.counts.inspected_qty));
    let top_three = top_defects(rows, 3)
        .into_iter()
        .enumerate()
        .map(|(i, t)| TopDefect {
            rank: i + 1,
            percentage: if inspected > 0 {
                format!("{:.2}", t.quantity as f64 * 100.0 / inspected as f64)
            } else {
                "0.00".to_string()
            },
            name: t.name,
            quantity: t.quantity,
        })
        .collect();

    HourlyDashboard {
        columns,
        defect_rows,
        top_three,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::models::{InspectionCounts, SelectedDefect, UserRef};
    use chrono::NaiveDate;

    fn inspection(hour: i64, inspected: i64, passed: i64, defective: i64, defects: &[(&str, i64)]) -> HourlyInspection {
        let selected: Vec<SelectedDefect> = defects
            .iter()
            .map(|(name, quantity)| SelectedDefect {
                name: name.to_string(),
                quantity: *quantity,
            })
            .collect();
        HourlyInspection {
            id: hour,
            user: UserRef {
                id: "u1".into(),
                user_name: "qc-line-4".into(),
            },
            report_date: NaiveDate::from_ymd_opt(2025, 11, 15).unwrap(),
            hour,
            hour_label: hour_label(hour),
            counts: InspectionCounts {
                total_defects: selected.iter().map(|d| d.quantity).sum(),
                selected_defects: selected,
                defective_pcs: defective,
                inspected_qty: inspected,
                passed_qty: passed,
                after_repair: 0,
            },
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_percent_rounded() {
        assert_eq!(percent_rounded(0, 0), 0);
        assert_eq!(percent_rounded(5, 0), 0);
        assert_eq!(percent_rounded(95, 100), 95);
        assert_eq!(percent_rounded(1, 8), 13); // 12.5 rounds up
        assert_eq!(percent_rounded(2, 3), 67);
    }

    #[test]
    fn test_percent_label() {
        assert_eq!(percent_label(0, 0), "0%");
        assert_eq!(percent_label(3, 40), "7.50%");
        assert_eq!(percent_label(1, 3), "33.33%");
    }

    #[test]
    fn test_totals_sum_all_rows() {
        let rows = vec![
            inspection(1, 100, 95, 5, &[("Oil Stain", 3), ("Open Seam", 4)]),
            inspection(2, 80, 76, 4, &[("Oil Stain", 2)]),
        ];
        let totals = QualityTotals::from_rows(&rows);
        assert_eq!(totals.inspected_qty, 180);
        assert_eq!(totals.passed_qty, 171);
        assert_eq!(totals.defective_pcs, 9);
        assert_eq!(totals.total_defects, 9);
    }

    #[test]
    fn test_top_defects_sorted_by_quantity() {
        let rows = vec![
            inspection(1, 100, 95, 5, &[("Broken Stitch", 1), ("Oil Stain", 3), ("Open Seam", 4)]),
            inspection(2, 80, 76, 4, &[("Oil Stain", 2), ("Stitch Skip", 4)]),
        ];
        let top = top_defects(&rows, 3);
        let names: Vec<&str> = top.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Oil Stain", "Open Seam", "Stitch Skip"]);
        assert_eq!(top[0].quantity, 5);
    }

    #[test]
    fn test_top_defects_ties_keep_first_seen_order() {
        let rows = vec![inspection(1, 10, 10, 0, &[("B", 2), ("A", 2), ("C", 2)])];
        let names: Vec<String> = top_defects(&rows, 2).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_summary_kpis() {
        let rows = vec![
            inspection(1, 100, 95, 5, &[("Oil Stain", 3), ("Open Seam", 4)]),
            inspection(2, 100, 97, 3, &[("Oil Stain", 2)]),
        ];
        let summary = summarize(&rows, "img".into(), "vid".into(), 3);
        assert_eq!(summary.passing_rate_pct, 96);
        assert_eq!(summary.reject_pct, 4);
        assert_eq!(summary.overall_dhu_pct, 5); // 9 / 200 = 4.5 -> 5
        assert_eq!(summary.defects, vec!["Oil Stain (5)", "Open Seam (4)"]);
        assert_eq!(summary.image_src, "img");
    }

    #[test]
    fn test_summary_without_defects_uses_placeholders() {
        let summary = summarize(&[], String::new(), String::new(), 3);
        assert_eq!(summary.defects, vec!["—", "—", "—"]);
        assert_eq!(summary.passing_rate_pct, 0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["overallDHUPct"], 0);
    }

    #[test]
    fn test_hourly_dashboard_layout() {
        let rows = vec![
            inspection(1, 40, 37, 3, &[("Oil Stain", 3)]),
            inspection(3, 50, 48, 2, &[("Open Seam", 1), ("Oil Stain", 1)]),
        ];
        let dash = hourly_dashboard(&rows);

        assert_eq!(dash.columns.len(), 12);
        assert_eq!(dash.columns[0].label, "1st Hour");
        assert_eq!(dash.columns[0].defective_rate, "7.50%");
        assert_eq!(dash.columns[0].dhu, "7.50%");
        assert_eq!(dash.columns[1].inspected_qty, 0);
        assert_eq!(dash.columns[1].dhu, "0%");
        assert_eq!(dash.columns[2].dhu, "4.00%");

        assert_eq!(dash.defect_rows.len(), 2);
        assert_eq!(dash.defect_rows[0].name, "Oil Stain");
        assert_eq!(dash.defect_rows[0].quantities[0], 3);
        assert_eq!(dash.defect_rows[0].quantities[2], 1);
        assert_eq!(dash.defect_rows[1].quantities[0], 0);

        assert_eq!(dash.top_three.len(), 2);
        assert_eq!(dash.top_three[0].rank, 1);
        assert_eq!(dash.top_three[0].name, "Oil Stain");
        assert_eq!(dash.top_three[0].percentage, "4.44"); // 4 / 90
    }

    #[test]
    fn test_huge_counts_saturate() {
        let rows = vec![
            inspection(1, i64::MAX, 0, 0, &[("Oil Stain", i64::MAX)]),
            inspection(2, i64::MAX, 0, 0, &[("Oil Stain", i64::MAX)]),
        ];
        let totals = QualityTotals::from_rows(&rows);
        assert_eq!(totals.inspected_qty, i64::MAX);
        assert_eq!(totals.total_defects, i64::MAX);
        assert_eq!(tally_defects(&rows)[0].quantity, i64::MAX);

        let dash = hourly_dashboard(&rows);
        assert_eq!(dash.top_three[0].quantity, i64::MAX);
    }
}
