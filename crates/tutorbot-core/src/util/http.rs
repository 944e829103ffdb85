use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client shared by every outbound collaborator.
///
/// Built once at startup and handed to each client by value (`Client` is an
/// `Arc` internally), so tests can construct their own.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(concat!("tutorbot/", env!("CARGO_PKG_VERSION")))
        .build()
}
