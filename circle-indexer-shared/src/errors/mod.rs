mod builder;
mod validation;

pub use builder::BuilderError;
pub use validation::ValidationError;
