use crate::constants::{HUMIDITY_COLUMN, TEMPERATURE_C_COLUMN, WEATHER_IMPACT_COLUMN, WIND_SPEED_COLUMN};
use crate::table::{cell_to_f64, float_cell, round_to, Cell, Table};
use serde_json::Value;
use tracing::{info, warn};

const TEMPERATURE_WEIGHT: f64 = 0.4;
const HUMIDITY_WEIGHT: f64 = 0.3;
const WIND_WEIGHT: f64 = 0.3;

/// Columns `weather_impact_score` is computed from.
pub const SCORE_OPERANDS: [&str; 3] = [TEMPERATURE_C_COLUMN, HUMIDITY_COLUMN, WIND_SPEED_COLUMN];

/// Weighted severity score for one observation, rounded to two places.
pub fn weather_impact_score(temperature_c: f64, humidity: f64, wind_speed_kmph: f64) -> f64 {
    round_to(
        temperature_c * TEMPERATURE_WEIGHT + humidity * HUMIDITY_WEIGHT + wind_speed_kmph * WIND_WEIGHT,
        2,
    )
}

/// Add `weather_impact_score` when the table has all three operand columns.
/// A row with any null (or non-numeric) operand gets a null score. Tables
/// missing an operand column are returned untouched.
pub fn add_weather_impact_score(mut table: Table, source_label: &str) -> Table {
    let missing = table.missing_columns(&SCORE_OPERANDS);
    if !missing.is_empty() {
        warn!(
            "Skipped {} for {}: required columns missing ({})",
            WEATHER_IMPACT_COLUMN,
            source_label,
            missing.join(", ")
        );
        return table;
    }

    let (Some(t), Some(h), Some(w)) = (
        table.column_index(TEMPERATURE_C_COLUMN),
        table.column_index(HUMIDITY_COLUMN),
        table.column_index(WIND_SPEED_COLUMN),
    ) else {
        return table;
    };

    let scores: Vec<Cell> = table
        .rows()
        .iter()
        .map(|row| match (cell_to_f64(&row[t]), cell_to_f64(&row[h]), cell_to_f64(&row[w])) {
            (Some(temp), Some(hum), Some(wind)) => float_cell(weather_impact_score(temp, hum, wind)),
            _ => Value::Null,
        })
        .collect();

    table.set_column(WEATHER_IMPACT_COLUMN, scores);
    info!("Added {} to {}", WEATHER_IMPACT_COLUMN, source_label);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_table(rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(
            vec![
                "date".into(),
                "temperature_c".into(),
                "humidity".into(),
                "wind_speed_kmph".into(),
            ],
            rows,
        )
    }

    #[test]
    fn test_score_computed_per_row() {
        let table = weather_table(vec![
            vec![json!("2024-01-01"), json!(10), json!(50), json!(20)],
            vec![json!("2024-01-02"), json!(21.5), json!(80), json!(5.5)],
        ]);
        let enriched = add_weather_impact_score(table, "test");
        assert_eq!(enriched.columns().last().unwrap(), "weather_impact_score");
        assert_eq!(enriched.get(0, "weather_impact_score"), Some(&json!(25.0)));
        // 8.6 + 24 + 1.65
        assert_eq!(enriched.get(1, "weather_impact_score"), Some(&json!(34.25)));
    }

    #[test]
    fn test_null_operand_propagates() {
        let table = weather_table(vec![vec![json!("2024-01-01"), Value::Null, json!(50), json!(20)]]);
        let enriched = add_weather_impact_score(table, "test");
        assert_eq!(enriched.get(0, "weather_impact_score"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_column_returns_table_unchanged() {
        let table = Table::from_rows(
            vec!["date".into(), "temperature_c".into(), "humidity".into()],
            vec![vec![json!("2024-01-01"), json!(10), json!(50)]],
        );
        let enriched = add_weather_impact_score(table.clone(), "test");
        assert_eq!(enriched, table);
    }

    #[test]
    fn test_weather_impact_score_rounding() {
        assert_eq!(weather_impact_score(10.0, 50.0, 20.0), 25.0);
        assert_eq!(weather_impact_score(1.111, 1.111, 1.111), 1.11);
    }
}
