use rand::Rng;

// ============== Admin Credentials ==============

/// Admin panel credentials, configured out of band (never stored in the document).
#[derive(Clone)]
pub struct AdminCredentials {
    user: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Plain-text comparison of both shared secrets.
    pub fn verify(&self, user: &str, password: &str) -> bool {
        self.user == user && self.password == password
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============== Access Codes ==============

pub const ACCESS_CODE_LEN: usize = 6;

/// Fresh numeric access code. Not checked for uniqueness against other users.
pub fn generate_access_code(rng: &mut impl Rng) -> String {
    (0..ACCESS_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
