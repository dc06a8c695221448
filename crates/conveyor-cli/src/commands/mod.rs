pub mod check;
pub mod dispatch;
pub mod run;
pub mod stages;
