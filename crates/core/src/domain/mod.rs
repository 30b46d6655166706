pub mod client;
pub mod order;
pub mod pricing_config;
pub mod public_quote;
pub mod quote;
