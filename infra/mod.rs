//! Infrastructure module cho onboarding core
//!
//! Module này chứa các interface tới collaborator bên ngoài:
//! - Service traits (node config source, node client, completion sender, command queue)
//! - Implementation tĩnh/in-memory cho binary và test
//!
//! ## Ví dụ:
//!
//! ```rust
//! use onboarding::infra::service_traits::{NodeClient, ServiceError};
//! use onboarding::infra::service_mocks::StaticNodeConfigSource;
//! ```

pub mod service_traits;
pub mod service_mocks;
