pub mod geometry;
pub mod summation;
