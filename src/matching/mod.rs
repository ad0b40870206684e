pub mod combiner;
pub mod manager;
pub mod matcher;
pub mod normalize;
pub mod similarity;
