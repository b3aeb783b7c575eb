//! Ratings chart for the favorites tab, rendered by the QuickChart service.

use crate::models::Movie;
use serde_json::json;

const QUICKCHART_BASE: &str = "https://quickchart.io/chart";
const CHART_WIDTH: u32 = 200;
const CHART_HEIGHT: u32 = 150;

/// URL of a bar chart with one bar per movie. Unparsable ratings are sent
/// as `null`, which the service draws as a gap.
pub fn chart_url(movies: &[Movie]) -> String {
    let labels: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
    let data: Vec<Option<f64>> = movies.iter().map(|m| m.vote_average.as_f64()).collect();
    let config = json!({
        "type": "bar",
        "data": {
            "labels": labels,
            "datasets": [{
                "label": "Movie Ratings",
                "data": data,
            }]
        }
    });
    format!(
        "{QUICKCHART_BASE}?w={CHART_WIDTH}&h={CHART_HEIGHT}&c={}",
        urlencoding::encode(&config.to_string())
    )
}

pub fn average_score(movies: &[Movie]) -> Option<f64> {
    let scores: Vec<f64> = movies
        .iter()
        .filter_map(|m| m.vote_average.as_f64())
        .filter(|s| s.is_finite())
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}
