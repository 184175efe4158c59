pub mod config;
pub mod constants;
pub mod daily;
pub mod error;
pub mod sources;
pub mod types;
#[cfg(test)]
pub mod test;
pub mod util {
    pub mod file_utils;
    pub mod lexicon_scorer;
    pub mod model_logger;
    #[cfg(test)]
    pub mod test_utils;
}
