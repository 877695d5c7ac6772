pub mod grading;
pub mod judge;
pub mod lookup;
pub mod plagiarism;
pub mod statistics;
