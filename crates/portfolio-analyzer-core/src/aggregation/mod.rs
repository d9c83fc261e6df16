pub mod combine;
pub mod ledger;
