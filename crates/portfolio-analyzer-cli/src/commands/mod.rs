pub mod comparison;
pub mod historical;
pub mod projection;
