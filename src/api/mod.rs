pub mod auth;
pub mod dashboard;
pub mod jd;
pub mod receipts;
pub mod reference;
pub mod server;
pub mod supervisor;

#[cfg(test)]
mod test_support;
