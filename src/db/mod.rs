pub mod catalog;
pub mod export;
pub mod offers;
pub mod pool;
pub mod tender;

pub use pool::create_pool;
