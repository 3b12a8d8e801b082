pub mod api;
pub mod failure;

pub use api::{MetadataResolver, ModelDescriptor};
pub use failure::{Aria2Classifier, FailureClassifier, FailureKind, SubstringClassifier};
