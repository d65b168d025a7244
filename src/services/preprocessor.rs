use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};

use crate::{
    error::{AppError, AppResult},
    models::{FeatureTable, FeatureValue},
    services::language_families::LanguageFamily,
};

/// Turns movie feature rows into a fixed-width numeric matrix
///
/// Output columns, left to right:
/// 1. numeric columns, nulls replaced by the batch median
/// 2. one-hot of the `original_language` family, first category dropped
/// 3. one indicator per genre seen while fitting
/// 4. one indicator per spoken-language family seen while fitting
pub struct MoviePreprocessor;

impl MoviePreprocessor {
    pub const NUMERIC_COLUMNS: [&'static str; 7] = [
        "popularity",
        "vote_average",
        "vote_count",
        "runtime",
        "budget",
        "revenue",
        "is_popular",
    ];
    pub const LANGUAGE_COLUMN: &'static str = "original_language";
    pub const GENRES_COLUMN: &'static str = "genres";
    pub const SPOKEN_LANGUAGES_COLUMN: &'static str = "spoken_languages";

    /// Learns medians, categories and label sets from `features`
    pub fn fit(features: &FeatureTable) -> AppResult<FittedPreprocessor> {
        let medians = Self::NUMERIC_COLUMNS
            .iter()
            .map(|name| -> AppResult<f64> {
                Ok(median(&numeric_column(features, name)?).unwrap_or(0.0))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let languages = language_column(features)?;
        let language_fill = most_frequent(&languages).unwrap_or(LanguageFamily::UnknownOther);
        let language_categories: Vec<LanguageFamily> = languages
            .iter()
            .map(|l| l.unwrap_or(language_fill))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let genre_labels = distinct_labels(&label_lists(features, Self::GENRES_COLUMN)?);
        let spoken_labels = distinct_labels(&spoken_families(features)?);

        Ok(FittedPreprocessor {
            medians,
            language_fill,
            language_categories,
            genre_labels,
            spoken_labels,
        })
    }

    /// Fresh fit on `features` followed by its transform
    pub fn fit_transform(features: &FeatureTable) -> AppResult<Array2<f64>> {
        let fitted = Self::fit(features)?;
        tracing::debug!(
            rows = features.len(),
            width = fitted.width(),
            "Fitted movie preprocessor"
        );
        fitted.transform(features)
    }
}

/// State learned by [`MoviePreprocessor::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPreprocessor {
    medians: Vec<f64>,
    language_fill: LanguageFamily,
    /// Sorted; the first entry is the dropped reference category
    language_categories: Vec<LanguageFamily>,
    genre_labels: Vec<String>,
    spoken_labels: Vec<String>,
}

impl FittedPreprocessor {
    pub fn width(&self) -> usize {
        self.medians.len()
            + self.language_categories.len().saturating_sub(1)
            + self.genre_labels.len()
            + self.spoken_labels.len()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = MoviePreprocessor::NUMERIC_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        names.extend(
            self.language_categories
                .iter()
                .skip(1)
                .map(|l| format!("{}_{}", MoviePreprocessor::LANGUAGE_COLUMN, l)),
        );
        names.extend(self.genre_labels.iter().cloned());
        names.extend(self.spoken_labels.iter().cloned());
        names
    }

    /// Encodes `features` with the fitted state; unseen labels contribute zeros
    pub fn transform(&self, features: &FeatureTable) -> AppResult<Array2<f64>> {
        let numeric = MoviePreprocessor::NUMERIC_COLUMNS
            .iter()
            .map(|name| numeric_column(features, name))
            .collect::<AppResult<Vec<_>>>()?;
        let languages = language_column(features)?;
        let genres = label_lists(features, MoviePreprocessor::GENRES_COLUMN)?;
        let spoken = spoken_families(features)?;

        let language_offset = self.medians.len();
        let genre_offset = language_offset + self.language_categories.len().saturating_sub(1);
        let spoken_offset = genre_offset + self.genre_labels.len();

        let language_slots: HashMap<LanguageFamily, usize> = self
            .language_categories
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, l)| (*l, language_offset + i - 1))
            .collect();
        let genre_slots = label_slots(&self.genre_labels, genre_offset);
        let spoken_slots = label_slots(&self.spoken_labels, spoken_offset);

        let mut matrix = Array2::zeros((features.len(), self.width()));
        for row in 0..features.len() {
            for (col, values) in numeric.iter().enumerate() {
                matrix[[row, col]] = values[row].unwrap_or(self.medians[col]);
            }

            let language = languages[row].unwrap_or(self.language_fill);
            if let Some(&col) = language_slots.get(&language) {
                matrix[[row, col]] = 1.0;
            }

            for label in &genres[row] {
                if let Some(&col) = genre_slots.get(label.as_str()) {
                    matrix[[row, col]] = 1.0;
                }
            }
            for label in &spoken[row] {
                if let Some(&col) = spoken_slots.get(label.as_str()) {
                    matrix[[row, col]] = 1.0;
                }
            }
        }

        Ok(matrix)
    }
}

fn numeric_column(features: &FeatureTable, name: &str) -> AppResult<Vec<Option<f64>>> {
    features
        .column(name)?
        .into_iter()
        .map(|cell| match cell {
            FeatureValue::Null => Ok(None),
            FeatureValue::Float(f) if f.is_nan() => Ok(None),
            other => other.as_f64().map(Some).ok_or_else(|| {
                AppError::InvalidInput(format!("Column {} holds a non-numeric value", name))
            }),
        })
        .collect()
}

fn language_column(features: &FeatureTable) -> AppResult<Vec<Option<LanguageFamily>>> {
    features
        .column(MoviePreprocessor::LANGUAGE_COLUMN)?
        .into_iter()
        .map(|cell| match cell {
            FeatureValue::Null => Ok(None),
            FeatureValue::Text(code) => Ok(Some(LanguageFamily::from_iso_code(code))),
            _ => Err(AppError::InvalidInput(format!(
                "Column {} must hold language codes",
                MoviePreprocessor::LANGUAGE_COLUMN
            ))),
        })
        .collect()
}

fn label_lists(features: &FeatureTable, name: &str) -> AppResult<Vec<Vec<String>>> {
    features
        .column(name)?
        .into_iter()
        .map(|cell| match cell {
            FeatureValue::Null => Ok(Vec::new()),
            FeatureValue::List(items) => Ok(items.clone()),
            _ => Err(AppError::InvalidInput(format!(
                "Column {} must hold lists of labels",
                name
            ))),
        })
        .collect()
}

fn spoken_families(features: &FeatureTable) -> AppResult<Vec<Vec<String>>> {
    Ok(
        label_lists(features, MoviePreprocessor::SPOKEN_LANGUAGES_COLUMN)?
            .into_iter()
            .map(|names| {
                names
                    .iter()
                    .map(|n| LanguageFamily::from_spoken_name(n).label().to_string())
                    .collect()
            })
            .collect(),
    )
}

fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Most common value; ties go to the smallest
fn most_frequent(values: &[Option<LanguageFamily>]) -> Option<LanguageFamily> {
    let mut counts: HashMap<LanguageFamily, usize> = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(*value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(family, _)| family)
}

fn distinct_labels(lists: &[Vec<String>]) -> Vec<String> {
    lists
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn label_slots(labels: &[String], offset: usize) -> HashMap<&str, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), offset + i))
        .collect()
}
