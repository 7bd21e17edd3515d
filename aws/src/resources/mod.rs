//! Resource implementations

pub mod sns_application;

pub use sns_application::SnsApplicationResource;
