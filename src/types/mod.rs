pub mod application;
pub mod component;
pub mod confidentiality;
pub mod payload;
pub mod period;
pub mod reference;
pub mod scope;

pub use application::{Application, CatalogGrant, Grant};
pub use component::Component;
pub use confidentiality::Confidentiality;
pub use period::Period;
pub use reference::{RefParser, TypeRef};
pub use scope::ScopeSet;
