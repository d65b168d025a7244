use serde::Deserialize;

use super::{FeatureTable, FeatureValue};

/// One enriched catalog entry, as stored in the movies feature group
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub id: i64,
    pub adult: bool,
    pub original_language: String,
    pub original_title: String,
    pub overview: String,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: i64,
    pub release_date: Option<String>,
    pub is_popular: bool,
    pub runtime: Option<i64>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<String>,
    pub spoken_languages: Vec<String>,
    /// `YYYY-MM-DD`
    pub extraction_date: Option<String>,
}

impl MovieRecord {
    pub const COLUMNS: [&'static str; 18] = [
        "id",
        "adult",
        "original_language",
        "original_title",
        "overview",
        "popularity",
        "vote_average",
        "vote_count",
        "release_date",
        "is_popular",
        "runtime",
        "budget",
        "revenue",
        "status",
        "tagline",
        "genres",
        "spoken_languages",
        "extraction_date",
    ];

    /// Overwrites the detail-endpoint fields with `info`
    pub fn with_extended_info(mut self, info: ExtendedInfo) -> Self {
        self.runtime = info.runtime;
        self.budget = info.budget;
        self.revenue = info.revenue;
        self.status = info.status;
        self.tagline = info.tagline;
        self.genres = info.genres;
        self.spoken_languages = info.spoken_languages;
        self
    }

    fn to_row(&self) -> Vec<FeatureValue> {
        vec![
            FeatureValue::Integer(self.id),
            FeatureValue::Bool(self.adult),
            FeatureValue::Text(self.original_language.clone()),
            FeatureValue::Text(self.original_title.clone()),
            FeatureValue::Text(self.overview.clone()),
            FeatureValue::Float(self.popularity),
            FeatureValue::Float(self.vote_average),
            FeatureValue::Integer(self.vote_count),
            self.release_date.clone().into(),
            FeatureValue::Bool(self.is_popular),
            self.runtime.into(),
            self.budget.into(),
            self.revenue.into(),
            self.status.clone().into(),
            self.tagline.clone().into(),
            FeatureValue::List(self.genres.clone()),
            FeatureValue::List(self.spoken_languages.clone()),
            self.extraction_date.clone().into(),
        ]
    }
}

impl FeatureTable {
    /// Builds the movies feature group layout from enriched records
    pub fn from_movies(movies: &[MovieRecord]) -> FeatureTable {
        FeatureTable::from_rows_unchecked(
            MovieRecord::COLUMNS.iter().map(|c| c.to_string()).collect(),
            movies.iter().map(MovieRecord::to_row).collect(),
        )
    }
}

/// Fields merged from the per-title detail endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedInfo {
    pub runtime: Option<i64>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub genres: Vec<String>,
    pub spoken_languages: Vec<String>,
}

impl ExtendedInfo {
    /// Same shape as a successful lookup, with every field null or empty
    pub fn empty() -> Self {
        Self::default()
    }
}

// ============================================================================
// TMDb API Types
// ============================================================================

/// One page of a paginated TMDb listing
///
/// Items are kept as raw JSON so a single malformed entry can be dropped
/// without losing the rest of the page.
#[derive(Debug, Deserialize)]
pub struct TmdbPage {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Entry of the discover listing
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub adult: bool,
    pub original_language: String,
    pub original_title: String,
    pub overview: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl From<TmdbMovie> for MovieRecord {
    fn from(movie: TmdbMovie) -> Self {
        MovieRecord {
            id: movie.id,
            adult: movie.adult,
            original_language: movie.original_language,
            original_title: movie.original_title,
            overview: movie.overview,
            popularity: movie.popularity,
            vote_average: movie.vote_average,
            vote_count: movie.vote_count,
            // TMDb sends "" for unknown release dates
            release_date: movie.release_date.filter(|d| !d.is_empty()),
            is_popular: false,
            runtime: None,
            budget: None,
            revenue: None,
            status: None,
            tagline: None,
            genres: Vec::new(),
            spoken_languages: Vec::new(),
            extraction_date: None,
        }
    }
}

/// Entry of the popular listing; only the ID is used
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPopularMovie {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbNamed {
    pub name: String,
}

/// Response of the per-title detail endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub revenue: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub genres: Option<Vec<TmdbNamed>>,
    #[serde(default)]
    pub spoken_languages: Option<Vec<TmdbNamed>>,
}

impl From<TmdbMovieDetails> for ExtendedInfo {
    fn from(details: TmdbMovieDetails) -> Self {
        let names = |items: Option<Vec<TmdbNamed>>| {
            items
                .unwrap_or_default()
                .into_iter()
                .map(|n| n.name)
                .collect()
        };

        ExtendedInfo {
            runtime: details.runtime,
            budget: details.budget,
            revenue: details.revenue,
            status: details.status,
            tagline: details.tagline,
            genres: names(details.genres),
            spoken_languages: names(details.spoken_languages),
        }
    }
}
