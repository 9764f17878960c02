pub mod connection;
pub mod scenarios;
pub mod teams;
pub mod users;

pub use connection::init_db;
pub use scenarios::ScenarioRepository;
pub use teams::TeamRepository;
pub use users::UserRepository;
