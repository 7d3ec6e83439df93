pub mod analyze;
pub mod dictionary;
pub mod health;
pub mod metrics;
pub mod root;

pub use analyze::analyze_image;
pub use dictionary::search_dictionary;
pub use health::health_check;
pub use self::metrics::metrics_endpoint;
pub use root::root;
