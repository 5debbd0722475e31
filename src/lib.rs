pub mod api_router;
pub mod audit;
pub mod auth;
pub mod clients;
pub mod config;
pub mod leads;
pub mod opportunities;
pub mod portfolio;
pub mod scope;
pub mod seed;
pub mod shared;

#[cfg(test)]
pub mod tests;
