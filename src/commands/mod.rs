pub mod check;
pub mod convert;
pub mod launcher;
pub mod worker;
