pub mod request;

pub use request::GraphqlRequestContext;
