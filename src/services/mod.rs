pub mod apply;
pub mod bucket_service;
pub mod datasource;
pub mod state_store;
pub mod user_service;
