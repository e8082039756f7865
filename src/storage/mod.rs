pub mod store;

pub use store::{FeatureStore, TableRecord};
