pub mod container;
pub mod error;

pub use container::{ContainerManager, ContainerStatus};
pub use error::{DockerError, Result};
