//! # trip-duration
//!
//! Predicts taxi trip duration (minutes) from pickup zone, dropoff zone and
//! passenger count with a one-hot encoded ordinary least squares model.
//!
//! ## Core Design Principles
//!
//! - **Explicit fitted state**: the vectorizer mapping is an immutable value
//!   returned by fit and passed into every transform and predict call.
//! - **Training/Inference Separation**: fitted models carry only prediction
//!   parameters; solver settings live on the trainer.
//! - **Paired artifacts**: vectorizer and model share a feature-space
//!   fingerprint and are persisted together in an [`artifact::ArtifactBundle`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use trip_duration::config::PipelineConfig;
//! use trip_duration::pipeline::{batch_predict, train_workflow};
//!
//! let config = PipelineConfig::default();
//! let outcome = train_workflow(
//!     "data/yellow_tripdata_2021-01.parquet",
//!     "data/yellow_tripdata_2021-02.parquet",
//!     &config,
//!     true,
//! )?;
//! println!("train rmse {:.3}, eval rmse {:.3}", outcome.train_rmse, outcome.eval_rmse);
//!
//! let predictions = batch_predict(&outcome.bundle, "data/yellow_tripdata_2021-03.parquet")?;
//! # Ok::<(), trip_duration::PipelineError>(())
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: trip records and Parquet/CSV readers.
//! - [`preprocessing`]: target, outlier filter, categorical encoding, dictionary vectorizer.
//! - [`backend`]: CSR sparse matrix.
//! - [`trainer`] / [`model`]: OLS solver and fitted linear model.
//! - [`metrics`]: RMSE and friends.
//! - [`artifact`]: persisted vectorizer + model pair.
//! - [`registry`]: versioned runs and lifecycle stages.
//! - [`pipeline`]: train and batch-predict workflows.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod registry;
pub mod serialization;
pub mod trainer;

pub use artifact::ArtifactBundle;
pub use error::{PipelineError, Result};
