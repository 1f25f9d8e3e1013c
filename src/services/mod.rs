pub mod credentials;
pub mod dispatcher;
pub mod mpesa_service;
pub mod poller;
pub mod transaction_log;
pub mod workflow;
