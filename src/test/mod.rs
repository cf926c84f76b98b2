/// Scenario tests spanning several modules
///
/// * `pipeline_tests` - train/predict runs over synthetic price histories
/// * `api_tests` - the HTTP routes driven in-process
pub mod api_tests;
