pub mod api;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::ExclusionPolicy;
pub use errors::{PolicyError, PolicyResult};
pub use loader::{load_policy, load_policy_with_options, LoadOptions};
pub use model::ExclusionRules;
