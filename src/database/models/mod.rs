pub mod notification;
pub mod payment;
pub mod slot;
pub mod subscription;
pub mod training;
pub mod user;

pub use notification::*;
pub use payment::*;
pub use slot::*;
pub use subscription::*;
pub use training::*;
pub use user::*;
