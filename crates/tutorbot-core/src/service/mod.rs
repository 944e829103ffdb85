pub mod dispatch;
pub mod http;
pub mod messages;
pub mod onboarding;
pub mod payment;
pub mod router;
pub mod stripe;
