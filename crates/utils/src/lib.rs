pub mod calendar;
pub mod response;
