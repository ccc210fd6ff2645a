pub mod estimate;
pub mod providers;
