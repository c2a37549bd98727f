pub mod check;
pub mod property;
