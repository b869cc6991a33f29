pub mod account_dto;
pub mod auth_dto;
pub mod webhook_dto;
