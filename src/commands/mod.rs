pub mod align;
pub mod generate;
pub mod inventory;
pub mod lengths;
pub mod metrics;
pub mod resolve;
pub mod status;
