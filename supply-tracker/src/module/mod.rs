pub mod supply;
pub mod frame;
