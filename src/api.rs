mod helper;

pub mod admin;
pub mod reviewer;
pub mod student;
