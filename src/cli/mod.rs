//! Interactive terminal front end

pub mod report;
pub mod session;
pub mod terminal;
pub mod ui;
