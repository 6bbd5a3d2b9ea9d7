pub mod capture;
pub mod completion;
pub mod reports;
