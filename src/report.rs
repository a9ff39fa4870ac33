//! Output formatting for CLI commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::analytics::allocation::AllocationPlan;
use crate::analytics::odds::{fmt_or_na, NOT_AVAILABLE};
use crate::analytics::settlement::LedgerSummary;
use crate::store::SideView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

fn percent(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}%", decimals, v * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// One side of one match as shown by `report`.
#[derive(Debug, Serialize, Tabled)]
pub struct MetricsRow {
    #[tabled(rename = "ID")]
    pub match_id: String,
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Team")]
    pub team: String,
    #[tabled(rename = "Odds")]
    pub odds: String,
    #[tabled(rename = "Platform")]
    pub platform_odds: String,
    #[tabled(rename = "Prob")]
    pub probability: String,
    #[tabled(rename = "E[profit]")]
    pub expected_profit: String,
    #[tabled(rename = "Variance")]
    pub variance: String,
    #[tabled(rename = "Kelly")]
    pub kelly: String,
    #[tabled(rename = "Rake")]
    pub rake: String,
}

impl MetricsRow {
    pub fn from_view(view: &SideView) -> Self {
        let m = &view.metrics;
        Self {
            match_id: view.match_id.clone(),
            time: view.time_label.clone(),
            team: view.team.clone(),
            odds: view.reference_odds.clone(),
            platform_odds: fmt_or_na(m.platform_odds.value(), 2),
            probability: fmt_or_na(m.probability, 2),
            expected_profit: percent(m.expected_profit, 2),
            variance: fmt_or_na(m.profit_variance, 2),
            kelly: fmt_or_na(m.kelly, 2),
            rake: percent(m.rake, 3),
        }
    }
}

pub fn metrics_rows(views: &[SideView]) -> Vec<MetricsRow> {
    views.iter().map(MetricsRow::from_view).collect()
}

/// One funded side as shown by `allocate`.
#[derive(Debug, Serialize, Tabled)]
pub struct AllocationRow {
    #[tabled(rename = "ID")]
    pub match_id: String,
    #[tabled(rename = "Team")]
    pub team: String,
    #[tabled(rename = "Platform")]
    pub platform_odds: String,
    #[tabled(rename = "Prob")]
    pub probability: String,
    #[tabled(rename = "E[profit]")]
    pub expected_profit: String,
    #[tabled(rename = "Kelly")]
    pub kelly: String,
    #[tabled(rename = "Stake")]
    pub stake: String,
}

pub fn allocation_rows(plan: &AllocationPlan<SideView>) -> Vec<AllocationRow> {
    plan.entries
        .iter()
        .map(|e| {
            let m = &e.entry.metrics;
            AllocationRow {
                match_id: e.entry.match_id.clone(),
                team: e.entry.team.clone(),
                platform_odds: fmt_or_na(m.platform_odds.value(), 2),
                probability: fmt_or_na(m.probability, 2),
                expected_profit: percent(m.expected_profit, 2),
                kelly: fmt_or_na(m.kelly, 4),
                stake: format!("{:.2}", e.allocated_stake),
            }
        })
        .collect()
}

/// Totals line under the allocation table.
pub fn allocation_footer(plan: &AllocationPlan<SideView>) -> String {
    format!(
        "bankroll {:.2}  allocated {:.2}  unallocated {:.2}  rounds {}",
        plan.bankroll, plan.allocated, plan.unallocated, plan.redistribution_rounds
    )
}

#[derive(Debug, Serialize, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Bets")]
    pub bets: usize,
    #[tabled(rename = "Settled")]
    pub settled: usize,
    #[tabled(rename = "Wins")]
    pub wins: usize,
    #[tabled(rename = "Staked")]
    pub total_staked: String,
    #[tabled(rename = "Profit")]
    pub total_profit: String,
    #[tabled(rename = "Success")]
    pub success_rate: String,
}

impl SummaryRow {
    pub fn new(scope: impl Into<String>, s: &LedgerSummary) -> Self {
        Self {
            scope: scope.into(),
            bets: s.bets,
            settled: s.settled,
            wins: s.wins,
            total_staked: format!("{:.2}", s.total_staked),
            total_profit: format!("{:.2}", s.total_profit),
            success_rate: percent(Some(s.success_rate), 1),
        }
    }
}
