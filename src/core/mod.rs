// Core modules implementing the object model, traversal, conversion, and error modeling.
pub mod budget;
pub mod convert;
pub mod error;
pub mod extract;
pub mod fault;
pub mod name;
pub mod path;
pub mod registry;
pub mod serialize;
pub mod value;
pub mod write;
