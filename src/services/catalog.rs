/// TMDb catalog client
///
/// Builds the movies feature group in stages, each taking the previous
/// stage's batch and returning a new one:
/// 1. Discover: `/discover/movie` pages → base records (incremental runs skip known IDs)
/// 2. Popular: `/movie/popular` pages → `is_popular` flag
/// 3. Details: `/movie/{id}` → runtime, budget, revenue, genres, spoken languages
/// 4. Persist: extraction date stamped, batch appended to the feature store
///
/// Per-page and per-title failures are logged and skipped; they only show
/// up as counters in the [`IngestionReport`].
use chrono::{NaiveDate, Utc};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::{collections::HashSet, time::Duration};

use crate::{
    db::{FeatureStore, InsertMode},
    error::{AppError, AppResult},
    models::{
        ExtendedInfo, FeatureTable, MovieRecord, TmdbMovie, TmdbMovieDetails, TmdbPage,
        TmdbPopularMovie,
    },
};

const DEFAULT_API_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_PAGES: u32 = 400;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub token: String,
    pub api_url: String,
    /// Number of pages read from each paginated endpoint
    pub pages: u32,
    /// Wall-clock bound for each individual request
    pub timeout: Duration,
    pub feature_group: String,
}

impl CatalogConfig {
    pub fn new(token: impl Into<String>, feature_group: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            pages: DEFAULT_PAGES,
            timeout: DEFAULT_TIMEOUT,
            feature_group: feature_group.into(),
        }
    }
}

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub pages_requested: u32,
    pub pages_failed: u32,
    /// New movies left after skipping stored IDs and dropping duplicates
    pub records_added: usize,
    pub records_skipped: usize,
    pub duplicates_dropped: usize,
    pub popular_pages_failed: u32,
    pub popular_ids: usize,
    pub details_failed: usize,
    pub records_stored: usize,
}

/// Movie records at some stage of enrichment, with the counters so far
#[derive(Debug, Clone, Default)]
pub struct MovieBatch {
    pub movies: Vec<MovieRecord>,
    pub report: IngestionReport,
}

pub struct CatalogClient {
    http_client: HttpClient,
    config: CatalogConfig,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            http_client: HttpClient::new(),
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// GETs `path` and decodes the JSON body; non-2xx is an error
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.token)
            .header("accept", "application/json")
            .query(query)
            .timeout(self.config.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "TMDb API returned status {} for {}",
                status, path
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_page(
        &self,
        path: &str,
        page: u32,
        extra: &[(&str, &str)],
    ) -> AppResult<TmdbPage> {
        let mut query: Vec<(&str, String)> =
            extra.iter().map(|(k, v)| (*k, v.to_string())).collect();
        query.push(("page", page.to_string()));
        self.get_json(path, &query).await
    }

    /// Decodes listing items, dropping entries that do not validate
    fn decode_items<T: DeserializeOwned>(items: Vec<serde_json::Value>) -> Vec<T> {
        let total = items.len();
        let decoded: Vec<T> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if decoded.len() < total {
            tracing::debug!(
                dropped = total - decoded.len(),
                "Dropped listing entries that failed validation"
            );
        }
        decoded
    }

    /// Fetches the discover pages into a de-duplicated base batch
    ///
    /// IDs in `existing_ids` are skipped. Fails with `EmptyResult` when no
    /// movie survives.
    pub async fn fetch_movies(&self, existing_ids: Option<&HashSet<i64>>) -> AppResult<MovieBatch> {
        let mut report = IngestionReport {
            pages_requested: self.config.pages,
            ..Default::default()
        };
        let mut movies = Vec::new();

        for page in 1..=self.config.pages {
            let listing = match self
                .get_page(
                    "/discover/movie",
                    page,
                    &[("sort_by", "release_date.desc"), ("vote_count.gte", "10")],
                )
                .await
            {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Skipping discover page");
                    report.pages_failed += 1;
                    continue;
                }
            };

            for movie in Self::decode_items::<TmdbMovie>(listing.results) {
                if existing_ids.is_some_and(|ids| ids.contains(&movie.id)) {
                    report.records_skipped += 1;
                    continue;
                }
                movies.push(MovieRecord::from(movie));
            }
        }

        let fetched = movies.len();
        let mut seen = HashSet::new();
        movies.retain(|m| seen.insert(m.id));
        report.duplicates_dropped = fetched - movies.len();
        report.records_added = movies.len();

        tracing::info!(
            added = report.records_added,
            skipped = report.records_skipped,
            duplicates = report.duplicates_dropped,
            pages_failed = report.pages_failed,
            "Discover pages processed"
        );

        if movies.is_empty() {
            return Err(AppError::EmptyResult(
                "No movies found in the catalog".to_string(),
            ));
        }

        Ok(MovieBatch { movies, report })
    }

    /// Collects IDs from the popular pages; failed pages are skipped
    pub async fn fetch_popular_ids(&self) -> (HashSet<i64>, u32) {
        let mut ids = HashSet::new();
        let mut pages_failed = 0;

        for page in 1..=self.config.pages {
            match self.get_page("/movie/popular", page, &[]).await {
                Ok(listing) => ids.extend(
                    Self::decode_items::<TmdbPopularMovie>(listing.results)
                        .into_iter()
                        .map(|m| m.id),
                ),
                Err(e) => {
                    tracing::warn!(page, error = %e, "Skipping popular page");
                    pages_failed += 1;
                }
            }
        }

        (ids, pages_failed)
    }

    /// Sets `is_popular` on every movie by membership in `popular_ids`
    pub fn apply_popularity(batch: MovieBatch, popular_ids: &HashSet<i64>) -> MovieBatch {
        let movies = batch
            .movies
            .into_iter()
            .map(|movie| MovieRecord {
                is_popular: popular_ids.contains(&movie.id),
                ..movie
            })
            .collect();

        MovieBatch {
            movies,
            report: IngestionReport {
                popular_ids: popular_ids.len(),
                ..batch.report
            },
        }
    }

    pub async fn mark_popular(&self, batch: MovieBatch) -> MovieBatch {
        let (popular_ids, pages_failed) = self.fetch_popular_ids().await;
        tracing::info!(
            popular = popular_ids.len(),
            pages_failed,
            "Popular movie IDs collected"
        );

        let mut marked = Self::apply_popularity(batch, &popular_ids);
        marked.report.popular_pages_failed = pages_failed;
        marked
    }

    pub async fn fetch_details(&self, movie_id: i64) -> AppResult<ExtendedInfo> {
        let details: TmdbMovieDetails = self
            .get_json(&format!("/movie/{}", movie_id), &[])
            .await?;
        Ok(ExtendedInfo::from(details))
    }

    /// Merges detail-endpoint fields into every movie
    ///
    /// A failed lookup merges an all-empty `ExtendedInfo`; no movie is dropped.
    pub async fn fetch_extended_info(&self, batch: MovieBatch) -> MovieBatch {
        let mut report = batch.report;
        let mut movies = Vec::with_capacity(batch.movies.len());

        for movie in batch.movies {
            let info = match self.fetch_details(movie.id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(movie_id = movie.id, error = %e, "No extended info for movie");
                    report.details_failed += 1;
                    ExtendedInfo::empty()
                }
            };
            movies.push(movie.with_extended_info(info));
        }

        tracing::info!(
            movies = movies.len(),
            failed = report.details_failed,
            "Extended movie info fetched"
        );

        MovieBatch { movies, report }
    }

    /// Sets `extraction_date` on movies that do not have one yet
    pub fn stamp_extraction_date(batch: MovieBatch, date: NaiveDate) -> MovieBatch {
        let stamp = date.format("%Y-%m-%d").to_string();
        let movies = batch
            .movies
            .into_iter()
            .map(|movie| MovieRecord {
                extraction_date: movie.extraction_date.or_else(|| Some(stamp.clone())),
                ..movie
            })
            .collect();

        MovieBatch {
            movies,
            report: batch.report,
        }
    }

    /// Appends the batch to the configured feature group
    ///
    /// Fails with `MissingState` when the batch holds no base records.
    pub async fn persist(
        &self,
        batch: MovieBatch,
        store: &dyn FeatureStore,
    ) -> AppResult<IngestionReport> {
        if batch.movies.is_empty() {
            return Err(AppError::MissingState(
                "Movies have not been fetched; nothing to store".to_string(),
            ));
        }

        let batch = Self::stamp_extraction_date(batch, Utc::now().date_naive());
        let features = FeatureTable::from_movies(&batch.movies);

        store
            .insert(&self.config.feature_group, &features, InsertMode::Append)
            .await?;

        let report = IngestionReport {
            records_stored: batch.movies.len(),
            ..batch.report
        };

        tracing::info!(
            feature_group = %self.config.feature_group,
            stored = report.records_stored,
            "Movies stored"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockFeatureStore;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movie_json(id: i64) -> Value {
        json!({
            "id": id,
            "adult": false,
            "original_language": "en",
            "original_title": format!("Test Movie {}", id),
            "overview": "Test overview",
            "popularity": 100.0,
            "vote_average": 8.5,
            "vote_count": 1000,
            "release_date": "2024-01-01"
        })
    }

    fn client_for(server: &MockServer, pages: u32) -> CatalogClient {
        CatalogClient::new(CatalogConfig {
            api_url: server.uri(),
            pages,
            timeout: Duration::from_secs(1),
            ..CatalogConfig::new("dummy_token", "test_movies")
        })
    }

    async fn mount_discover(server: &MockServer, page: u32, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn batch_of(ids: &[i64]) -> MovieBatch {
        MovieBatch {
            movies: ids
                .iter()
                .map(|id| {
                    let movie: TmdbMovie = serde_json::from_value(movie_json(*id)).unwrap();
                    MovieRecord::from(movie)
                })
                .collect(),
            report: IngestionReport::default(),
        }
    }

    #[tokio::test]
    async fn test_fetch_movies_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(header("authorization", "Bearer dummy_token"))
            .and(query_param("sort_by", "release_date.desc"))
            .and(query_param("vote_count.gte", "10"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "results": [movie_json(1)] })),
            )
            .mount(&server)
            .await;

        let batch = client_for(&server, 1).fetch_movies(None).await.unwrap();
        assert_eq!(batch.movies.len(), 1);
        assert_eq!(batch.movies[0].original_title, "Test Movie 1");
        assert_eq!(batch.movies[0].vote_average, 8.5);
        assert_eq!(batch.report.records_added, 1);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let server = MockServer::start().await;
        mount_discover(&server, 1, 200, json!({ "results": [movie_json(1), movie_json(2)] })).await;
        mount_discover(&server, 2, 500, json!({ "status_message": "boom" })).await;
        mount_discover(&server, 3, 200, json!({ "results": [movie_json(3)] })).await;

        let batch = client_for(&server, 3).fetch_movies(None).await.unwrap();
        let ids: Vec<i64> = batch.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(batch.report.pages_requested, 3);
        assert_eq!(batch.report.pages_failed, 1);
    }

    #[tokio::test]
    async fn test_http_error_everywhere_is_empty_result() {
        let server = MockServer::start().await;
        mount_discover(&server, 1, 404, json!({})).await;

        let result = client_for(&server, 1).fetch_movies(None).await;
        assert!(matches!(result, Err(AppError::EmptyResult(_))));
    }

    #[tokio::test]
    async fn test_existing_ids_are_skipped() {
        let server = MockServer::start().await;
        mount_discover(&server, 1, 200, json!({ "results": [movie_json(1)] })).await;

        let existing = HashSet::from([1]);
        let result = client_for(&server, 1).fetch_movies(Some(&existing)).await;
        assert!(matches!(result, Err(AppError::EmptyResult(_))));
    }

    #[tokio::test]
    async fn test_duplicates_and_invalid_items_dropped() {
        let server = MockServer::start().await;
        mount_discover(
            &server,
            1,
            200,
            json!({ "results": [movie_json(1), { "id": 5 }, movie_json(2)] }),
        )
        .await;
        mount_discover(&server, 2, 200, json!({ "results": [movie_json(2), movie_json(3)] })).await;

        let existing = HashSet::from([3]);
        let batch = client_for(&server, 2)
            .fetch_movies(Some(&existing))
            .await
            .unwrap();
        let ids: Vec<i64> = batch.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(batch.report.records_added, 2);
        assert_eq!(batch.report.records_skipped, 1);
        assert_eq!(batch.report.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_malformed_page_body_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        mount_discover(&server, 2, 200, json!({ "results": [movie_json(4)] })).await;

        let batch = client_for(&server, 2).fetch_movies(None).await.unwrap();
        assert_eq!(batch.movies.len(), 1);
        assert_eq!(batch.movies[0].id, 4);
        assert_eq!(batch.report.pages_failed, 1);
    }

    #[tokio::test]
    async fn test_timed_out_page_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [movie_json(1)] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        mount_discover(&server, 2, 200, json!({ "results": [movie_json(2)] })).await;

        let client = CatalogClient::new(CatalogConfig {
            api_url: server.uri(),
            pages: 2,
            timeout: Duration::from_millis(100),
            ..CatalogConfig::new("dummy_token", "test_movies")
        });
        let batch = client.fetch_movies(None).await.unwrap();
        let ids: Vec<i64> = batch.movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(batch.report.pages_failed, 1);
    }

    #[tokio::test]
    async fn test_refused_connection_fails_every_page() {
        // Nothing listens on a port released right after binding
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let api_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = CatalogClient::new(CatalogConfig {
            api_url,
            pages: 2,
            timeout: Duration::from_secs(1),
            ..CatalogConfig::new("dummy_token", "test_movies")
        });
        let result = client.fetch_movies(None).await;
        assert!(matches!(result, Err(AppError::EmptyResult(_))));

        let (ids, pages_failed) = client.fetch_popular_ids().await;
        assert!(ids.is_empty());
        assert_eq!(pages_failed, 2);
    }

    #[tokio::test]
    async fn test_mark_popular() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": 1, "title": "Popular Movie 1" },
                    { "id": 7, "title": "Popular Movie 7" }
                ]
            })))
            .mount(&server)
            .await;

        let batch = client_for(&server, 1).mark_popular(batch_of(&[1, 2])).await;
        assert!(batch.movies[0].is_popular);
        assert!(!batch.movies[1].is_popular);
        assert_eq!(batch.report.popular_ids, 2);
    }

    #[tokio::test]
    async fn test_mark_popular_error_marks_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let batch = client_for(&server, 2).mark_popular(batch_of(&[1])).await;
        assert!(!batch.movies[0].is_popular);
        assert_eq!(batch.report.popular_pages_failed, 2);
    }

    #[test]
    fn test_apply_empty_popularity() {
        let batch = CatalogClient::apply_popularity(batch_of(&[1, 2, 3]), &HashSet::new());
        assert!(batch.movies.iter().all(|m| !m.is_popular));
    }

    #[tokio::test]
    async fn test_fetch_extended_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "runtime": 120,
                "budget": 1000000,
                "revenue": 2000000,
                "status": "Released",
                "tagline": "Test tagline",
                "genres": [{ "id": 28, "name": "Action" }],
                "spoken_languages": [{ "name": "English" }]
            })))
            .mount(&server)
            .await;

        let batch = client_for(&server, 1)
            .fetch_extended_info(batch_of(&[1]))
            .await;
        let movie = &batch.movies[0];
        assert_eq!(movie.runtime, Some(120));
        assert_eq!(movie.budget, Some(1_000_000));
        assert_eq!(movie.genres, vec!["Action".to_string()]);
        assert_eq!(movie.tagline.as_deref(), Some("Test tagline"));
        assert_eq!(batch.report.details_failed, 0);
    }

    #[tokio::test]
    async fn test_failed_details_keep_base_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let batch = client_for(&server, 1)
            .fetch_extended_info(batch_of(&[1]))
            .await;
        assert_eq!(batch.movies.len(), 1);
        let movie = &batch.movies[0];
        assert_eq!(movie.id, 1);
        assert_eq!(movie.original_title, "Test Movie 1");
        assert_eq!(movie.runtime, None);
        assert_eq!(movie.budget, None);
        assert_eq!(movie.revenue, None);
        assert!(movie.genres.is_empty());
        assert!(movie.spoken_languages.is_empty());
        assert_eq!(batch.report.details_failed, 1);
    }

    #[test]
    fn test_stamp_extraction_date_keeps_existing() {
        let mut batch = batch_of(&[1, 2]);
        batch.movies[1].extraction_date = Some("2020-05-05".to_string());

        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let stamped = CatalogClient::stamp_extraction_date(batch, date);
        assert_eq!(stamped.movies[0].extraction_date.as_deref(), Some("2024-03-09"));
        assert_eq!(stamped.movies[1].extraction_date.as_deref(), Some("2020-05-05"));
    }

    #[tokio::test]
    async fn test_persist_appends_stamped_batch() {
        let mut store = MockFeatureStore::new();
        store
            .expect_insert()
            .withf(|group, features, mode| {
                let dates = features.column("extraction_date").unwrap();
                group == "test_movies"
                    && features.len() == 2
                    && *mode == InsertMode::Append
                    && dates.iter().all(|d| !d.is_null())
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let server = MockServer::start().await;
        let report = client_for(&server, 1)
            .persist(batch_of(&[1, 2]), &store)
            .await
            .unwrap();
        assert_eq!(report.records_stored, 2);
    }

    #[tokio::test]
    async fn test_persist_without_movies_is_missing_state() {
        let mut store = MockFeatureStore::new();
        store.expect_insert().times(0);

        let server = MockServer::start().await;
        let result = client_for(&server, 1)
            .persist(MovieBatch::default(), &store)
            .await;
        assert!(matches!(result, Err(AppError::MissingState(_))));
    }
}
