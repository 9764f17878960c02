pub mod exchange;
pub mod persona;
pub mod scenario_context;
pub mod scenarios;
pub mod scoring;
pub mod sessions;
pub mod teams;
pub mod users;

#[cfg(test)]
pub mod test_support;
