pub mod health;
pub mod identities;
pub mod queries;
pub mod workflows;
