pub mod config;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod paths;
pub mod project;
pub mod workspace;

pub use config::{load_dotenv, Config};
pub use discovery::{DirectoryCatalog, WORKTREES_DIR};
pub use error::*;
pub use fetcher::{GitCliFetcher, RepoFetcher};
pub use project::{ProjectDescriptor, ProjectLoader, YamlProjectLoader, DESCRIPTOR_FILE};
pub use workspace::{StaticCatalog, WorkspaceInfo, WorkspaceLookup};
