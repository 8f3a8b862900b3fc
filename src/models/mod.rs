pub mod api;
pub mod job;
pub mod moderation;
pub mod request;
