//! Preprocessing stages that turn raw trip records into model inputs.
//!
//! Stages run in this order:
//!
//! 1. [`compute_target`]: add the trip duration in minutes.
//! 2. [`filter_outliers`]: keep trips whose duration lies in [`DurationBounds`].
//! 3. [`encode_categorical_cols`]: normalise categorical columns to strings.
//! 4. [`extract_x_y`]: one-hot encode with a [`DictVectorizer`] and pull out the target.
//!
//! # Core Traits
//!
//! - [`Transformer`]: unfitted transformer holding configuration.
//! - [`FittedTransformer`]: fitted transformer ready for inference.
//!
//! # Example
//!
//! ```ignore
//! use trip_duration::preprocessing::{DictVectorizer, FittedTransformer, Transformer};
//!
//! let dv = DictVectorizer::new(cols).fit(&train_records)?;
//! let x_train = dv.transform(&train_records)?;
//!
//! dv.save_to_file("dv.bin")?;
//! let loaded = FittedDictVectorizer::load_from_file("dv.bin")?;
//! let x_val = loaded.transform(&val_records)?;
//! ```

pub mod dict_vectorizer;
pub mod encoding;
pub mod outliers;
pub mod target;
pub mod traits;

pub use dict_vectorizer::{
    extract_x_y, target_vector, DictVectorizer, DictVectorizerParams, Features,
    FittedDictVectorizer,
};
pub use encoding::{canonical_category, encode_categorical_cols, MISSING_SENTINEL};
pub use outliers::{filter_outliers, DurationBounds};
pub use target::{compute_target, duration_minutes};
pub use traits::{FittedTransformer, Transformer};
