mod coupon;
mod license;
mod order;
mod outbound_email;
mod payment_session;
mod product;

pub use coupon::*;
pub use license::*;
pub use order::*;
pub use outbound_email::*;
pub use payment_session::*;
pub use product::*;
