//! Access code generation.
//!
//! Codes are drawn uniformly from `10000..=99999`. Nothing checks them
//! against codes already issued, locally or remotely.

use rand::Rng;

use crate::models::AccessCode;

pub const CODE_MIN: u32 = 10_000;
pub const CODE_MAX: u32 = 99_999;

pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> AccessCode;
}

/// Default generator backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> AccessCode {
        AccessCode::from(rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX))
    }
}

/// Always returns the same code. Handy when a caller needs a known value.
#[derive(Debug, Clone)]
pub struct FixedCodeGenerator(pub AccessCode);

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> AccessCode {
        self.0.clone()
    }
}
