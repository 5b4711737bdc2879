pub mod coding;
pub mod config;
pub mod emitter;
pub mod error;
pub mod fhir;
pub mod identity;
pub mod input;
pub mod observation;
pub mod output;
pub mod pipeline;
pub mod row;
pub mod specimen;
pub mod substance;
pub mod timepoint;
pub mod validate;
