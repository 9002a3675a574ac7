pub mod access;
pub mod analytics;
pub mod export;
pub mod filters;
pub mod period;

#[cfg(test)]
pub mod test_fixtures;
