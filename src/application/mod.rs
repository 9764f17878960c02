pub mod use_cases;

pub use use_cases::exchange::{ExchangeSettings, ExchangeUseCase};
pub use use_cases::scenarios::ScenarioUseCase;
pub use use_cases::sessions::SessionUseCase;
pub use use_cases::teams::TeamUseCase;
pub use use_cases::users::UserUseCase;
