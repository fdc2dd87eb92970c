#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Island hydration and on-demand module bundling.
//!
//! Server-rendered pages embed small interactive components ("islands")
//! through [`IslandRenderer`]. Each island's bootstrap script imports its
//! component from the script endpoint, which [`ScriptService`] answers by
//! compiling exactly one source file and rewriting every import: bare
//! packages point at a CDN, local modules point back at the endpoint.

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod island;
pub mod manifest;
pub mod paths;
pub mod resolve;
pub mod service;
pub mod version;

pub use cache::{BundleCache, EvictionPolicy};
pub use config::ServerConfig;
pub use endpoint::ScriptEndpoint;
pub use engine::{BundlerEngine, SwcEngine};
pub use error::Error;
pub use island::{IslandChild, IslandError, IslandRenderer};
pub use manifest::DependencyManifest;
pub use paths::AllowList;
pub use resolve::{CdnAliasHook, OnDemandHook, ResolverChain};
pub use service::{ScriptQuery, ScriptService, ServeError, ServedScript};
pub use version::VERSION;
