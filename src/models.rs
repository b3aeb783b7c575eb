use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type MovieId = i64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_average: Score,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_count: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Genre {
    pub name: String,
}

/// Backend scores arrive either as JSON numbers or as strings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl Default for Score {
    fn default() -> Self {
        Score::Text(String::new())
    }
}

impl Score {
    /// Numeric value with `parseFloat` leniency: leading numeric prefix of text, `None` if there is none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Score::Number(n) => Some(*n),
            Score::Text(s) => parse_float_prefix(s),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{}", n),
            Score::Text(s) => f.write_str(s),
        }
    }
}

impl Movie {
    /// Genre names joined for display, falling back to the vote count.
    pub fn genre_label(&self) -> String {
        match &self.genres {
            Some(genres) => genres
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            None => self.vote_count.to_string(),
        }
    }
}

/// Entry returned by a title search.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchOption {
    pub id: MovieId,
    pub title: String,
}

impl From<&Movie> for SearchOption {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoginToken {
    pub token: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl AccountOutcome {
    pub fn created() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Movie list body. Favorites and search wrap it in `{ "results": [...] }`, older backends send the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MovieList {
    Envelope { results: Vec<Movie> },
    Bare(Vec<Movie>),
}

impl MovieList {
    pub(crate) fn into_movies(self) -> Vec<Movie> {
        match self {
            MovieList::Envelope { results } => results,
            MovieList::Bare(movies) => movies,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_float_prefix(input: &str) -> Option<f64> {
    let trimmed = input.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in trimmed.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    trimmed[..end].trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_numeric_and_text_scores() {
        let movie: Movie = serde_json::from_value(json!({
            "id": 1,
            "title": "Inception",
            "vote_average": 8.4,
            "release_date": "2010-07-15",
            "vote_count": "35000"
        }))
        .unwrap();
        assert_eq!(movie.vote_average, Score::Number(8.4));
        assert_eq!(movie.vote_count, Score::Text("35000".to_string()));
        assert!(movie.genres.is_none());
        assert_eq!(movie.genre_label(), "35000");
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let movie: Movie = serde_json::from_value(json!({ "id": 2, "title": "Heat" })).unwrap();
        assert_eq!(movie.release_date, "");
        assert_eq!(movie.vote_average.as_f64(), None);

        let movie: Movie = serde_json::from_value(json!({
            "id": 2,
            "title": "Heat",
            "release_date": null,
            "vote_average": null
        }))
        .unwrap();
        assert_eq!(movie.release_date, "");
        assert_eq!(movie.vote_average.as_f64(), None);
    }

    #[test]
    fn genre_label_joins_names() {
        let movie: Movie = serde_json::from_value(json!({
            "id": 3,
            "title": "Alien",
            "genres": [{ "name": "Horror" }, { "name": "Science Fiction" }]
        }))
        .unwrap();
        assert_eq!(movie.genre_label(), "Horror, Science Fiction");
    }

    #[test]
    fn text_scores_parse_like_parse_float() {
        assert_eq!(Score::Text("7.25".into()).as_f64(), Some(7.25));
        assert_eq!(Score::Text(" 6.5/10".into()).as_f64(), Some(6.5));
        assert_eq!(Score::Text("-3".into()).as_f64(), Some(-3.0));
        assert_eq!(Score::Text("8.".into()).as_f64(), Some(8.0));
        assert_eq!(Score::Text("n/a".into()).as_f64(), None);
        assert_eq!(Score::Number(9.0).to_string(), "9");
    }
}
