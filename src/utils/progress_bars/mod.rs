pub mod logging;
pub mod village_progress;
