pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod catalog;
pub mod source;
pub mod settings;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
pub use catalog::load_from_pool;
pub use source::{EntitySource, PgCatalog, StaticEntities};
pub use settings::Settings;
