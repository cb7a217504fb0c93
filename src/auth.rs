use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Single shared password for every login. The hotel has one catalog,
/// so the user and database names are only logged.
#[derive(Debug)]
pub struct HotelAuthSource {
    password: Vec<u8>,
}

impl HotelAuthSource {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.as_bytes().to_vec(),
        }
    }
}

#[async_trait]
impl AuthSource for HotelAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        tracing::debug!(user = ?login.user(), database = ?login.database(), "password login");
        Ok(Password::new(None, self.password.clone()))
    }
}
