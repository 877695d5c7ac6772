pub mod enrollment;
pub mod judge;
pub mod statistics;
pub mod submission;
