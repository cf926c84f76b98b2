// Technical indicators and feature names. `close` must stay first: it is the
// prediction target column.
pub const TECHNICAL_INDICATORS: [&str; 5] = ["close", "sma_20", "sma_50", "rsi_14", "volume"];

// Feature set used when only stored prices are available
pub const CLOSE_ONLY_FEATURES: [&str; 1] = ["close"];

// Index of the close column in every feature set
pub const TARGET_COLUMN: usize = 0;

// Indicator windows
pub const SMA_SHORT_WINDOW: usize = 20;
pub const SMA_LONG_WINDOW: usize = 50;
pub const RSI_WINDOW: usize = 14;

// Model parameters
pub const SEQUENCE_LENGTH: usize = 60; // Number of time steps to look back
pub const DROPOUT_RATE: f64 = 0.2;
pub const DENSE_SIZE: usize = 25;

// Data preprocessing
pub const TRAIN_SPLIT_RATIO: f64 = 0.8; // 80% of rows for training, cut before windowing

// Model paths
pub const MODEL_PATH: &str = "models";
pub const MODEL_FILE_NAME: &str = "lstm_stock_model";
pub const CURRENT_POINTER: &str = "CURRENT";
pub const RETAINED_VERSIONS: usize = 2;
