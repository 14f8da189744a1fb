//! Elastic container instance domain: wire types and the pod translators.

pub mod credentials;
pub mod quantity;
pub mod status;
pub mod translate;
pub mod types;
pub mod volume;

pub use status::{container_group_status, container_group_to_pod};
pub use translate::{create_request, group_name};
pub use types::{ContainerGroup, CreateContainerGroup};
