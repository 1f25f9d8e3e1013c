pub mod callback;
pub mod mpesa_transactions;
pub mod payment;
