pub mod account;
pub mod checkout;
pub mod entitlement;
pub mod gate;
pub mod lifecycle;
pub mod portal;
pub mod profile;
pub mod wizard;
