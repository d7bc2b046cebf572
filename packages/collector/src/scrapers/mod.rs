//! Site-specific scrapers. Each source gets one module and one entry in
//! the registry in `main.rs`.

pub mod bylt;
