//! Sale-price arithmetic on top of provider costs: the margin calculator and
//! the side-by-side comparison of the quotes collected for one request.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Provider, Quote};

pub const DEFAULT_MARGIN_PCT: f64 = 15.0;
pub const MINIMUM_MARGIN_PCT: f64 = 10.0;
const GOOD_MARGIN_PCT: f64 = 20.0;
const HIGH_MARGIN_PCT: f64 = 30.0;
const MARKET_BAND_PCT: f64 = 10.0;
const MARKET_PREMIUM_RATIO: f64 = 0.15;
const EXPIRING_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PricingError {
    #[error("provider cost must be greater than 0")]
    NonPositiveCost,
    #[error("additional costs must not be negative")]
    NegativeExtraCosts,
    #[error("margin must be at least 0 and below 100")]
    MarginOutOfRange,
    #[error("margin must be between 0 and 100")]
    AppliedMarginOutOfRange,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price that leaves `margin_pct` of the price as profit over `cost`.
pub fn sale_price(cost: f64, margin_pct: f64) -> f64 {
    cost / (1.0 - margin_pct / 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketPrices {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of the positive costs quoted so far, or `None` when there are none.
pub fn market_prices(costs: impl IntoIterator<Item = f64>) -> Option<MarketPrices> {
    let costs: Vec<f64> = costs
        .into_iter()
        .filter(|cost| cost.is_finite() && *cost > 0.0)
        .collect();
    if costs.is_empty() {
        return None;
    }
    let sum: f64 = costs.iter().sum();
    let min = costs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(MarketPrices {
        average: round2(sum / costs.len() as f64),
        min: round2(min),
        max: round2(max),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketPosition {
    #[serde(rename = "POR DEBAJO")]
    Below,
    #[serde(rename = "EN RANGO")]
    InRange,
    #[serde(rename = "POR ENCIMA")]
    Above,
    #[serde(rename = "SIN DATOS")]
    NoData,
}

pub fn market_position(price: f64, market_average: Option<f64>) -> MarketPosition {
    match market_average {
        Some(average) if average > 0.0 => {
            let diff_pct = (price - average) / average * 100.0;
            if diff_pct < -MARKET_BAND_PCT {
                MarketPosition::Below
            } else if diff_pct > MARKET_BAND_PCT {
                MarketPosition::Above
            } else {
                MarketPosition::InRange
            }
        }
        _ => MarketPosition::NoData,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarginInput {
    pub provider_cost: f64,
    pub extra_costs: Option<f64>,
    pub margin_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarginBreakdown {
    pub provider_cost: f64,
    pub extra_costs: f64,
    pub total_cost: f64,
    pub margin_pct: f64,
    pub minimum_margin_pct: f64,
    pub suggested_price: f64,
    pub minimum_price: f64,
    pub estimated_profit: f64,
    pub minimum_profit: f64,
    pub roi_pct: f64,
    pub market_average: Option<f64>,
    pub market_min: Option<f64>,
    pub market_max: Option<f64>,
    pub market_position: MarketPosition,
    pub recommendation: String,
    pub alerts: Vec<String>,
}

pub fn calculate_margin(
    input: &MarginInput,
    market: Option<&MarketPrices>,
) -> Result<MarginBreakdown, PricingError> {
    if !(input.provider_cost > 0.0 && input.provider_cost.is_finite()) {
        return Err(PricingError::NonPositiveCost);
    }
    let extra_costs = input.extra_costs.unwrap_or(0.0);
    if extra_costs < 0.0 {
        return Err(PricingError::NegativeExtraCosts);
    }
    let margin_pct = input.margin_pct.unwrap_or(DEFAULT_MARGIN_PCT);
    if !(0.0..100.0).contains(&margin_pct) {
        return Err(PricingError::MarginOutOfRange);
    }

    let total_cost = input.provider_cost + extra_costs;
    let suggested_price = sale_price(total_cost, margin_pct);
    let minimum_price = sale_price(total_cost, MINIMUM_MARGIN_PCT);
    let estimated_profit = suggested_price - total_cost;
    let minimum_profit = minimum_price - total_cost;
    let roi_pct = estimated_profit / total_cost * 100.0;
    let position = market_position(suggested_price, market.map(|m| m.average));

    Ok(MarginBreakdown {
        provider_cost: input.provider_cost,
        extra_costs,
        total_cost: round2(total_cost),
        margin_pct,
        minimum_margin_pct: MINIMUM_MARGIN_PCT,
        suggested_price: round2(suggested_price),
        minimum_price: round2(minimum_price),
        estimated_profit: round2(estimated_profit),
        minimum_profit: round2(minimum_profit),
        roi_pct: round2(roi_pct),
        market_average: market.map(|m| m.average),
        market_min: market.map(|m| m.min),
        market_max: market.map(|m| m.max),
        market_position: position,
        recommendation: recommendation(margin_pct, suggested_price, market),
        alerts: alerts(margin_pct, position),
    })
}

fn recommendation(margin_pct: f64, price: f64, market: Option<&MarketPrices>) -> String {
    let mut notes = vec![if margin_pct < MINIMUM_MARGIN_PCT {
        "Low margin. Consider raising it to at least 10%."
    } else if margin_pct <= GOOD_MARGIN_PCT {
        "Acceptable margin."
    } else if margin_pct <= HIGH_MARGIN_PCT {
        "Good margin."
    } else {
        "Very high margin. Check competitiveness."
    }];

    if let Some(market) = market.filter(|m| m.average > 0.0) {
        let diff = price - market.average;
        if diff < 0.0 {
            notes.push("Price below the market average, very competitive.");
        } else if diff > market.average * MARKET_PREMIUM_RATIO {
            notes.push("Price well above the market average, review the strategy.");
        }
    }
    notes.join(" ")
}

fn alerts(margin_pct: f64, position: MarketPosition) -> Vec<String> {
    let mut alerts = Vec::new();
    if margin_pct < MINIMUM_MARGIN_PCT {
        alerts.push("Margin below the recommended minimum (10%)".to_string());
    }
    if margin_pct > HIGH_MARGIN_PCT {
        alerts.push("Very high margin may hurt competitiveness".to_string());
    }
    if position == MarketPosition::Above {
        alerts.push("Price above the market".to_string());
    }
    alerts
}

/// Margins written onto a stored quote may be anywhere in `[0, 100]`.
pub fn validate_applied_margin(margin_pct: f64) -> Result<f64, PricingError> {
    if (0.0..=100.0).contains(&margin_pct) {
        Ok(margin_pct)
    } else {
        Err(PricingError::AppliedMarginOutOfRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidityState {
    Vigente,
    ProximoAVencer,
    Vencido,
    SinFecha,
}

pub fn validity(valid_until: Option<NaiveDate>, today: NaiveDate) -> (Option<i64>, ValidityState) {
    match valid_until {
        None => (None, ValidityState::SinFecha),
        Some(date) => {
            let days = (date - today).num_days();
            let state = if days < 0 {
                ValidityState::Vencido
            } else if days <= EXPIRING_SOON_DAYS {
                ValidityState::ProximoAVencer
            } else {
                ValidityState::Vigente
            };
            (Some(days), state)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Competitiveness {
    MuyCompetitivo,
    Competitivo,
    PocoCompetitivo,
}

pub fn competitiveness(cost_rank: usize, margin_rank: usize) -> Competitiveness {
    let mean = (cost_rank + margin_rank) as f64 / 2.0;
    if mean <= 2.0 {
        Competitiveness::MuyCompetitivo
    } else if mean <= 4.0 {
        Competitiveness::Competitivo
    } else {
        Competitiveness::PocoCompetitivo
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteComparison {
    pub quote_id: Uuid,
    pub request_folio: String,
    pub provider_name: String,
    pub provider_country: Option<String>,
    pub transport_mode: String,
    pub origin: String,
    pub destination: String,
    pub unit_type: Option<String>,
    pub estimated_time: Option<String>,
    pub cost: f64,
    pub margin_pct: Option<f64>,
    pub sale_price: Option<f64>,
    pub estimated_profit: Option<f64>,
    pub roi_pct: Option<f64>,
    pub credit_days: Option<i32>,
    pub valid_until: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub validity: ValidityState,
    pub cost_rank: Option<usize>,
    pub margin_rank: Option<usize>,
    pub competitiveness: Option<Competitiveness>,
    pub status: String,
}

/// Builds the comparison rows for the quotes of one request. Ranks are
/// 1-based; ties keep the input order.
pub fn compare_quotes(
    request_folio: &str,
    rows: &[(Quote, Provider)],
    today: NaiveDate,
) -> Vec<QuoteComparison> {
    let mut comparisons: Vec<QuoteComparison> = rows
        .iter()
        .map(|(quote, provider)| {
            let sale = quote
                .margin_pct
                .filter(|m| *m > 0.0 && *m < 100.0)
                .map(|m| sale_price(quote.cost, m));
            let profit = sale.map(|price| price - quote.cost);
            let roi = profit
                .filter(|_| quote.cost > 0.0)
                .map(|profit| profit / quote.cost * 100.0);
            let (days_remaining, validity) = validity(quote.valid_until, today);

            QuoteComparison {
                quote_id: quote.id,
                request_folio: request_folio.to_string(),
                provider_name: provider.name.clone(),
                provider_country: provider.country.clone(),
                transport_mode: quote.transport_mode.clone(),
                origin: quote.origin.clone(),
                destination: quote.destination.clone(),
                unit_type: quote.unit_type.clone(),
                estimated_time: quote.estimated_time.clone(),
                cost: quote.cost,
                margin_pct: quote.margin_pct,
                sale_price: sale.map(round2),
                estimated_profit: profit.map(round2),
                roi_pct: roi.map(round2),
                credit_days: quote.credit_days,
                valid_until: quote.valid_until,
                days_remaining,
                validity,
                cost_rank: None,
                margin_rank: None,
                competitiveness: None,
                status: quote.status.clone(),
            }
        })
        .collect();

    let mut by_cost: Vec<usize> = (0..comparisons.len()).collect();
    by_cost.sort_by(|&a, &b| comparisons[a].cost.total_cmp(&comparisons[b].cost));
    for (rank, index) in by_cost.into_iter().enumerate() {
        comparisons[index].cost_rank = Some(rank + 1);
    }

    let mut by_margin: Vec<(usize, f64)> = comparisons
        .iter()
        .enumerate()
        .filter_map(|(index, c)| c.margin_pct.map(|m| (index, m)))
        .collect();
    by_margin.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (rank, (index, _)) in by_margin.into_iter().enumerate() {
        comparisons[index].margin_rank = Some(rank + 1);
    }

    for comparison in &mut comparisons {
        if let (Some(cost_rank), Some(margin_rank)) = (comparison.cost_rank, comparison.margin_rank)
        {
            comparison.competitiveness = Some(competitiveness(cost_rank, margin_rank));
        }
    }
    comparisons
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn default_margin_prices_at_fifteen_percent() {
        let breakdown = calculate_margin(
            &MarginInput {
                provider_cost: 850.0,
                extra_costs: Some(150.0),
                margin_pct: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(breakdown.total_cost, 1000.0);
        assert_eq!(breakdown.margin_pct, DEFAULT_MARGIN_PCT);
        assert_eq!(breakdown.suggested_price, 1176.47);
        assert_eq!(breakdown.minimum_price, 1111.11);
        assert_eq!(breakdown.estimated_profit, 176.47);
        assert_eq!(breakdown.minimum_profit, 111.11);
        assert_eq!(breakdown.roi_pct, 17.65);
        assert_eq!(breakdown.market_position, MarketPosition::NoData);
        assert_eq!(breakdown.recommendation, "Acceptable margin.");
        assert!(breakdown.alerts.is_empty());
    }

    #[test]
    fn rejects_bad_inputs() {
        let input = |cost, extra, margin| MarginInput {
            provider_cost: cost,
            extra_costs: extra,
            margin_pct: margin,
        };
        assert_eq!(
            calculate_margin(&input(0.0, None, None), None).unwrap_err(),
            PricingError::NonPositiveCost
        );
        assert_eq!(
            calculate_margin(&input(100.0, Some(-1.0), None), None).unwrap_err(),
            PricingError::NegativeExtraCosts
        );
        assert_eq!(
            calculate_margin(&input(100.0, None, Some(100.0)), None).unwrap_err(),
            PricingError::MarginOutOfRange
        );
    }

    #[test]
    fn market_statistics_ignore_non_positive_costs() {
        let market = market_prices([1000.0, 0.0, 1200.0, -5.0, 1400.0]).unwrap();
        assert_eq!(market.average, 1200.0);
        assert_eq!(market.min, 1000.0);
        assert_eq!(market.max, 1400.0);
        assert!(market_prices([0.0]).is_none());
    }

    #[test]
    fn market_position_uses_ten_percent_band() {
        assert_eq!(market_position(850.0, Some(1000.0)), MarketPosition::Below);
        assert_eq!(market_position(1050.0, Some(1000.0)), MarketPosition::InRange);
        assert_eq!(market_position(1150.0, Some(1000.0)), MarketPosition::Above);
        assert_eq!(market_position(1150.0, Some(0.0)), MarketPosition::NoData);
        assert_eq!(market_position(1150.0, None), MarketPosition::NoData);
    }

    #[test]
    fn high_margin_above_market_raises_alerts() {
        let market = MarketPrices {
            average: 1000.0,
            min: 900.0,
            max: 1100.0,
        };
        let breakdown = calculate_margin(
            &MarginInput {
                provider_cost: 1000.0,
                extra_costs: None,
                margin_pct: Some(40.0),
            },
            Some(&market),
        )
        .unwrap();
        assert_eq!(breakdown.market_position, MarketPosition::Above);
        assert_eq!(breakdown.alerts.len(), 2);
        assert!(breakdown.recommendation.starts_with("Very high margin"));
        assert!(breakdown.recommendation.contains("well above"));
    }

    #[test]
    fn applied_margin_accepts_closed_range() {
        assert_eq!(validate_applied_margin(0.0), Ok(0.0));
        assert_eq!(validate_applied_margin(100.0), Ok(100.0));
        assert!(validate_applied_margin(100.5).is_err());
        assert!(validate_applied_margin(-0.1).is_err());
    }

    #[test]
    fn validity_states() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();
        assert_eq!(validity(None, today()), (None, ValidityState::SinFecha));
        assert_eq!(validity(Some(day(1)), today()).1, ValidityState::ProximoAVencer);
        assert_eq!(validity(Some(day(8)), today()).1, ValidityState::ProximoAVencer);
        assert_eq!(validity(Some(day(9)), today()), (Some(8), ValidityState::Vigente));
        let expired = validity(Some(NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()), today());
        assert_eq!(expired, (Some(-2), ValidityState::Vencido));
    }

    #[test]
    fn competitiveness_thresholds() {
        assert_eq!(competitiveness(1, 3), Competitiveness::MuyCompetitivo);
        assert_eq!(competitiveness(3, 5), Competitiveness::Competitivo);
        assert_eq!(competitiveness(5, 5), Competitiveness::PocoCompetitivo);
    }

    #[test]
    fn comparison_ranks_by_cost_and_margin() {
        let created: NaiveDateTime = today().and_hms_opt(9, 0, 0).unwrap();
        let provider = Provider {
            id: Uuid::new_v4(),
            name: "Naviera Sur".into(),
            email: None,
            phone: None,
            country: Some("Chile".into()),
            city: None,
            active: true,
            created_at: created,
        };
        let quote = |id: u128, cost: f64, margin: Option<f64>| Quote {
            id: Uuid::from_u128(id),
            request_id: Uuid::nil(),
            provider_id: provider.id,
            transport_mode: "MARITIMO".into(),
            origin: "Valparaiso".into(),
            destination: "Manzanillo".into(),
            unit_type: None,
            estimated_time: None,
            cost,
            valid_until: None,
            credit_days: None,
            margin_pct: margin,
            status: "PENDIENTE".into(),
            created_at: created,
        };
        let rows = vec![
            (quote(1, 3000.0, Some(10.0)), provider.clone()),
            (quote(2, 1000.0, Some(20.0)), provider.clone()),
            (quote(3, 2000.0, None), provider.clone()),
        ];

        let result = compare_quotes("ACME-00001-2025", &rows, today());
        let ranks: Vec<_> = result.iter().map(|c| (c.cost_rank, c.margin_rank)).collect();
        assert_eq!(
            ranks,
            vec![(Some(3), Some(2)), (Some(1), Some(1)), (Some(2), None)]
        );
        assert_eq!(result[1].competitiveness, Some(Competitiveness::MuyCompetitivo));
        assert_eq!(result[0].competitiveness, Some(Competitiveness::Competitivo));
        assert_eq!(result[2].competitiveness, None);
        assert_eq!(result[1].sale_price, Some(1250.0));
        assert_eq!(result[1].estimated_profit, Some(250.0));
        assert_eq!(result[1].roi_pct, Some(25.0));
        assert_eq!(result[2].validity, ValidityState::SinFecha);
    }
}
