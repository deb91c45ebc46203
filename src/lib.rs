pub mod aggregate;
pub mod app;
pub mod arrayexpress;
pub mod config;
pub mod context;
pub mod document;
pub mod domain;
pub mod error;
pub mod expand;
pub mod geo;
pub mod http;
pub mod impact;
pub mod normalize;
pub mod output;
pub mod pubmed;
pub mod record;
pub mod report;
pub mod resolver;
pub mod sink;
pub mod term;
