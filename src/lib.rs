pub mod api;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod service;
#[cfg(test)]
pub mod test;

pub mod util {
    pub mod feature_engineering;
    pub mod metrics;
    pub mod model_utils;
    pub mod pre_processor;
    pub mod resource_usage;
    #[cfg(test)]
    pub mod test_utils;
}

pub mod lstm {
    pub mod step_1_tensor_preparation;
    pub mod step_2_lstm_cell;
    pub mod step_3_lstm_model_arch;
    pub mod step_4_train_model;
    pub mod step_5_prediction;
    pub mod step_6_model_serialization;
}

/// Build-time metadata generated by `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use error::{PipelineError, Result};
