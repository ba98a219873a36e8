pub mod executor;
pub mod output;

pub use executor::ExtractionExecutor;
