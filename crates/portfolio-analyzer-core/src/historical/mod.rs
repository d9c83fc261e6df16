pub mod analysis;
pub mod fees;
pub mod performance;
pub mod prices;
pub mod returns;
