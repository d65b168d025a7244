pub mod feature_table;
pub mod movie;

pub use feature_table::{ColumnKind, FeatureTable, FeatureValue};
pub use movie::{
    ExtendedInfo, MovieRecord, TmdbMovie, TmdbMovieDetails, TmdbNamed, TmdbPage,
    TmdbPopularMovie,
};
