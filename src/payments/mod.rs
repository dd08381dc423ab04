mod moneymotion;
mod session_cache;

pub use moneymotion::*;
pub use session_cache::*;
