pub mod balance;
pub mod employee;
pub mod leave_type;
pub mod request;
