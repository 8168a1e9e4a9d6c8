//! Protocol types: envelope, shapes, registry, substitution, identity, results and errors.

pub mod envelope;
pub mod error;
pub mod identity;
pub mod registry;
pub mod result;
pub mod shape;
pub mod substitution;

pub use envelope::{Envelope, Operation};
pub use error::{DataAccessError, ErrorKind, ValidationError, ValidationIssue};
pub use registry::{ActionDefinition, Registry, RegistryError, TableDefinition, ViewDefinition};
pub use result::{DispatchResponse, ResultEnvelope};
pub use shape::{FieldKind, FieldSpec, Shape};
pub use substitution::Substitution;

impl From<RegistryError> for DataAccessError {
    fn from(err: RegistryError) -> Self {
        match err {
            e @ RegistryError::NotFound { .. } => DataAccessError::NotFound(e.to_string()),
            RegistryError::Invalid(m) => DataAccessError::Internal(m),
        }
    }
}
