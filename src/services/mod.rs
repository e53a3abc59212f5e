pub mod customer_identity;
pub mod order_service;
