pub mod context;
pub mod object;
