// Core modules implementing extraction, planning, and error modeling.
pub mod error;
pub mod extract;
pub mod plan;
pub mod sample;
pub mod well;
