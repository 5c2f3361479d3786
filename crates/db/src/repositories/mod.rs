pub mod presence_repo;
pub mod session_repo;
pub mod user_repo;

pub use presence_repo::PresenceRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
