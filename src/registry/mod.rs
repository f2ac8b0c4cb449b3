pub mod npm;
pub mod scanner;

pub use npm::NpmRegistry;
pub use scanner::PlanScanner;
