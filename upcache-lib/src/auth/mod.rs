//! Authentication

mod cache;
mod client_credentials;
mod grant;
mod token;

pub use cache::AuthFlow;
pub use cache::TokenCache;
pub use client_credentials::ClientCredentialsFlow;
pub use grant::TokenGrant;
pub use token::AccessToken;
pub use token::StaticTokenProvider;
pub use token::TokenProvider;
