pub mod orders;
pub mod payments;
pub mod pi_sessions;
pub mod pricing;
pub mod promos;
pub mod rates;
pub mod status;
pub mod stock;
