pub mod check;
pub mod seen;
