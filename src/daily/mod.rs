//! Daily forecasting pipeline, one module per step.
//!
//! Prices and headlines are aligned (steps 2 and 3), windowed into samples
//! (step 4) and assembled with a cached or synthetic fallback (steps 1, 5 and
//! 9). A regressor is then fitted (steps 6 and 7) and its next-day prediction
//! capped (step 8).
pub mod step_1_synthetic_series;
pub mod step_2_sentiment_alignment;
pub mod step_3_technical_indicators;
pub mod step_4_windowed_dataset;
pub mod step_5_dataset_assembly;
pub mod step_6_regressor_arch;
pub mod step_7_train_model;
pub mod step_8_bounded_prediction;
pub mod step_9_dataset_serialization;
