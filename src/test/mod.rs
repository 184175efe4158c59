/// Cross-module test suites
///
/// * `pipeline_tests` - Assembly, fallback, training and capped prediction run end to end
/// * `file_utils_tests` - Full runs driven by CSV price files and JSON news files
///
/// Step-level behaviour is tested next to each step module.
pub mod file_utils_tests;
