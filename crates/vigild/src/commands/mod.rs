pub mod operator;
pub mod run;
