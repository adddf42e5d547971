pub mod drugs;
pub mod health;
pub mod inventory;
pub mod logs;
pub mod patient;
pub mod payments;
pub mod pharmacy;
pub mod prescriptions;
pub mod prices;
