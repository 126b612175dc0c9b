pub mod audit;
pub mod choice;
pub mod question;
pub mod user;
pub mod vote;

pub use audit::*;
pub use choice::*;
pub use question::*;
pub use user::*;
pub use vote::*;
